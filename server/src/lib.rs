//! # Mancala Server Library
//!
//! This library provides the authoritative server for multi-player mancala
//! played over a line-oriented text protocol. Any number of players can sit
//! at the table, join while a game is running, and leave at any time; the
//! server keeps the canonical board and broadcasts it after every change.
//!
//! ## Core Responsibilities
//!
//! ### Connection Handling
//! Every accepted TCP connection starts by choosing a name. Bytes arrive in
//! arbitrary chunks, so each connection keeps its own line buffer and the
//! server never waits on a client that has not finished a line.
//!
//! ### Turn Order
//! Seated players form a ring. Exactly one of them holds the turn whenever
//! anyone is seated, and the turn moves to the next player in the ring after
//! a move, or immediately when the player holding it disconnects.
//!
//! ### Sowing
//! A move lifts every pebble from one of the mover's pits and drops them one
//! by one into the following pits, continuing through the other players'
//! rows. The mover's own end pit receives pebbles, other end pits are
//! skipped, and a last pebble landing in the mover's end pit earns another
//! move.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! The server runs on a current-thread runtime. Reader tasks forward raw bytes
//! to one main loop that owns the roster and applies each event completely.
//! The resulting text is queued on a writer task per connection, so the loop
//! never waits on a socket. A connection that stops reading falls behind by a
//! bounded number of batches and is then disconnected. No game state is
//! shared, so nothing needs a lock.
//!
//! ### Transport-Independent Core
//! The [`dispatcher`] turns events into ordered writes and closes without
//! touching a socket, which keeps the whole protocol testable in memory. The
//! [`network`] module is the thin TCP shell around it.
//!
//! ## Module Organization
//!
//! - `roster`: player records, seeding of latecomers, the turn ring
//! - `sowing`: the move rules
//! - `session`: naming and playing phases of one connection
//! - `dispatcher`: event handling and broadcast formatting
//! - `network`: listener, reader and writer tasks, the main loop
//! - `error`: the error taxonomy
//!
//! ## Known Limitations
//!
//! There are no timeouts. A player holding the turn who never sends a move
//! stalls the game until it disconnects.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:3000").await?;
//!
//!     // Runs until one seated player has emptied all of its sowing pits
//!     for (name, points) in server.run().await? {
//!         println!("{} has {} points", name, points);
//!     }
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod network;
pub mod roster;
pub mod session;
pub mod sowing;
