use crate::rendering::ServerLines;
use log::{info, warn};
use shared::LineError;
use std::io::BufRead;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Terminal client relaying stdin lines to the server and server lines to stdout
pub struct Client {
    stream: TcpStream,
    lines: ServerLines,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        info!("Connected to {}", stream.peer_addr()?);

        Ok(Client {
            stream,
            lines: ServerLines::new(),
        })
    }

    /// Relays input and output until the server closes the connection
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (mut reader, mut writer) = self.stream.into_split();
        let mut input_rx = Self::spawn_input_reader();
        let mut stdout = tokio::io::stdout();
        let mut buffer = [0u8; 1024];

        loop {
            tokio::select! {
                read = reader.read(&mut buffer) => {
                    let len = read?;
                    match self.lines.push(&buffer[..len]) {
                        Ok(lines) => {
                            for line in lines {
                                stdout.write_all(format!("{}\n", line).as_bytes()).await?;
                            }
                            stdout.flush().await?;
                        }
                        Err(LineError::PeerClosed) => {
                            info!("Server closed the connection");
                            break;
                        }
                        Err(error) => warn!("Dropping server output: {}", error),
                    }
                },

                Some(line) = input_rx.recv() => {
                    writer.write_all(format!("{}\r\n", line.trim_end()).as_bytes()).await?;
                },
            }
        }

        Ok(())
    }

    /// Reads stdin on a plain thread so a pending read never holds up shutdown
    fn spawn_input_reader() -> mpsc::UnboundedReceiver<String> {
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if input_tx.send(line).is_err() {
                    break;
                }
            }
        });

        input_rx
    }
}
