//! # Mancala Terminal Client
//!
//! A minimal line-oriented client for the mancala server. Anything typed on
//! stdin is sent to the server as one CRLF-terminated line, and every line the
//! server sends is printed to stdout as soon as it is complete.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connection handling and the relay loop between the terminal and the socket.
//!
//! ### Rendering Module (`rendering`)
//! Reassembles server output into lines, tolerating reads that split a line
//! and stripping the NUL padding older servers append to each message.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("127.0.0.1:3000").await?;
//!     client.run().await
//! }
//! ```

pub mod network;
pub mod rendering;

pub use rendering::ServerLines;
