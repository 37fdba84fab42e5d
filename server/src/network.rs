//! Server network layer: TCP accept, per-connection reader and writer tasks
//! and the main loop

use crate::dispatcher::{Dispatcher, Outbound};
use crate::error::{is_peer_gone, ServerError};
use crate::roster::ConnectionId;
use log::{debug, info, warn};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const READ_BUFFER_SIZE: usize = 1024;
/// Events reader and writer tasks can queue ahead of the main loop
const EVENT_QUEUE_SIZE: usize = 256;
/// Unwritten batches a connection may accumulate before it is dropped
pub const WRITE_QUEUE_SIZE: usize = 64;
/// Time given to closed connections to flush their last lines at shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Messages sent from connection tasks to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    /// Bytes of one read; empty once the peer has closed its side
    Received { id: ConnectionId, bytes: Vec<u8> },
    ReadFailed { id: ConnectionId, error: io::Error },
    WriteFailed { id: ConnectionId, error: io::Error },
}

/// How a connection's writer is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Write everything already queued, then shut the socket down
    Drain,
    /// Drop queued output at once
    Abort,
}

struct Connection {
    addr: SocketAddr,
    outbox: mpsc::Sender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Mancala server owning the listener, every connection and the dispatcher
///
/// Reader tasks only move bytes from their socket into the event channel and
/// writer tasks only move queued text onto their socket. All game state lives
/// in the main loop, which handles one event at a time and never waits on a
/// socket, so a peer that stops reading cannot hold up anyone else.
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    connections: HashMap<ConnectionId, Connection>,
    /// Writers of closed connections still flushing their last lines
    draining: Vec<JoinHandle<()>>,

    server_tx: mpsc::Sender<ServerMessage>,
    server_rx: mpsc::Receiver<ServerMessage>,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(ServerError::Bind)?;
        info!("Server listening on {}", addr);
        Ok(Self::new(listener))
    }

    /// Wraps an already bound listener
    pub fn new(listener: TcpListener) -> Self {
        let (server_tx, server_rx) = mpsc::channel(EVENT_QUEUE_SIZE);

        Server {
            listener,
            dispatcher: Dispatcher::new(),
            connections: HashMap::new(),
            draining: Vec::new(),
            server_tx,
            server_rx,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs until the game is over, then reports the final scores
    ///
    /// Protocol errors, bad moves and lost peers are handled per connection.
    /// Only a failing accept or a failing write to a live peer ends the loop
    /// with an error.
    pub async fn run(mut self) -> Result<Vec<(String, u32)>, ServerError> {
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted.map_err(ServerError::Accept)?;
                    self.register(stream, addr);
                },

                Some(message) = self.server_rx.recv() => {
                    let out = match message {
                        ServerMessage::Received { id, bytes } => {
                            debug!("Connection {} delivered {} byte(s)", id, bytes.len());
                            self.dispatcher.receive(id, &bytes)
                        }
                        ServerMessage::ReadFailed { id, error } => {
                            warn!("Read from connection {} failed: {}", id, error);
                            self.dispatcher.disconnect(id)
                        }
                        ServerMessage::WriteFailed { id, error } => self.write_failed(id, error)?,
                    };
                    self.apply(out);
                },
            }

            if self.dispatcher.is_game_over() {
                break;
            }
        }

        let scores = self.dispatcher.scores();
        let out = self.dispatcher.finish();
        self.apply(out);
        self.flush().await;
        info!("Server shutting down");
        Ok(scores)
    }

    fn register(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (id, out) = self.dispatcher.connect();
        info!(
            "Client {} connected from {} ({} connection(s))",
            id,
            addr,
            self.dispatcher.connection_count()
        );

        let (reader, writer) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::channel(WRITE_QUEUE_SIZE);
        let reader = Self::spawn_reader(id, reader, self.server_tx.clone());
        let writer = Self::spawn_writer(id, writer, outbox_rx, self.server_tx.clone());
        self.connections.insert(
            id,
            Connection {
                addr,
                outbox,
                reader,
                writer,
            },
        );

        self.apply(out);
    }

    /// Spawns the task forwarding every read of one connection
    fn spawn_reader(
        id: ConnectionId,
        mut reader: OwnedReadHalf,
        server_tx: mpsc::Sender<ServerMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer = [0u8; READ_BUFFER_SIZE];

            loop {
                match reader.read(&mut buffer).await {
                    Ok(len) => {
                        let bytes = buffer[..len].to_vec();
                        let delivered = server_tx.send(ServerMessage::Received { id, bytes }).await;
                        if delivered.is_err() || len == 0 {
                            break;
                        }
                    }
                    Err(error) => {
                        let _ = server_tx.send(ServerMessage::ReadFailed { id, error }).await;
                        break;
                    }
                }
            }
        })
    }

    /// Spawns the task writing queued text to one connection
    ///
    /// The socket is shut down once the queue is closed and drained. A failed
    /// write is reported to the main loop and ends the task.
    fn spawn_writer(
        id: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut outbox: mpsc::Receiver<String>,
        server_tx: mpsc::Sender<ServerMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(text) = outbox.recv().await {
                if let Err(error) = writer.write_all(text.as_bytes()).await {
                    let _ = server_tx.send(ServerMessage::WriteFailed { id, error }).await;
                    return;
                }
            }

            if let Err(error) = writer.shutdown().await {
                debug!("Shutdown of connection {} failed: {}", id, error);
            }
        })
    }

    /// Handles a write error reported by a writer task
    ///
    /// A peer that is already gone counts as a disconnect; any other failure
    /// on a live connection is fatal.
    fn write_failed(
        &mut self,
        id: ConnectionId,
        error: io::Error,
    ) -> Result<Vec<Outbound>, ServerError> {
        if !self.connections.contains_key(&id) {
            debug!("Write to closed connection {} failed: {}", id, error);
            return Ok(Vec::new());
        }
        if !is_peer_gone(&error) {
            return Err(ServerError::Write { id, source: error });
        }

        warn!("Connection {} went away during write: {}", id, error);
        Ok(self.dispatcher.disconnect(id))
    }

    /// Queues the writes and performs the closes of one event in order
    ///
    /// Text for the same connection is joined into one batch per pass. A
    /// connection whose writer has fallen `WRITE_QUEUE_SIZE` batches behind is
    /// dropped, and whatever the dispatcher emits for that is applied too.
    fn apply(&mut self, out: Vec<Outbound>) {
        let mut queue: VecDeque<Outbound> = out.into();

        while !queue.is_empty() {
            let mut batches: Vec<(ConnectionId, String)> = Vec::new();

            while let Some(outbound) = queue.pop_front() {
                match outbound {
                    Outbound::Send { to, text } => {
                        match batches.iter_mut().find(|(id, _)| *id == to) {
                            Some((_, batch)) => batch.push_str(&text),
                            None => batches.push((to, text)),
                        }
                    }
                    Outbound::Close { id } => {
                        if let Some(index) = batches.iter().position(|(to, _)| *to == id) {
                            let (_, batch) = batches.remove(index);
                            self.deliver(id, batch, &mut queue);
                        }
                        self.close(id, Shutdown::Drain);
                    }
                }
            }

            for (to, batch) in batches {
                self.deliver(to, batch, &mut queue);
            }
        }
    }

    fn deliver(&mut self, to: ConnectionId, text: String, queue: &mut VecDeque<Outbound>) {
        let Some(connection) = self.connections.get(&to) else {
            return;
        };

        match connection.outbox.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Connection {} is not reading its output, dropping it", to);
                self.close(to, Shutdown::Abort);
                queue.extend(self.dispatcher.disconnect(to));
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Writer of connection {} has already stopped", to);
            }
        }
    }

    fn close(&mut self, id: ConnectionId, shutdown: Shutdown) {
        let Some(connection) = self.connections.remove(&id) else {
            return;
        };

        connection.reader.abort();
        self.draining.retain(|writer| !writer.is_finished());
        match shutdown {
            Shutdown::Drain => self.draining.push(connection.writer),
            Shutdown::Abort => connection.writer.abort(),
        }
        info!("Client {} from {} disconnected", id, connection.addr);
    }

    /// Waits for closed connections to write out what they were sent last
    async fn flush(&mut self) {
        for writer in std::mem::take(&mut self.draining) {
            if timeout(SHUTDOWN_GRACE, writer).await.is_err() {
                warn!("Gave up flushing a connection at shutdown");
            }
        }
    }
}
