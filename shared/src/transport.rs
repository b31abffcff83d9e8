//! Length-prefixed, compressed message framing over a stream socket
//!
//! A frame is a 4-byte big-endian length followed by an lz4 block (size
//! prepended) holding the JSON encoding of one [`Message`].
//!
//! A [`Connection`] owns two background tasks: a reader that decodes frames
//! into the inbound queue, and a writer that drains the outbound queue onto
//! the socket. The simulation only ever touches the two queues.

use crate::error::TransportError;
use crate::protocol::{Answer, Message, HELLO_ANSWER, HELLO_QUESTION};
use log::{debug, info, warn};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;
pub const CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Serializes, compresses and length-prefixes one message
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, TransportError> {
    let json = serde_json::to_vec(message).map_err(TransportError::Encode)?;
    let payload = compress_prepend_size(&json);

    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decompresses and decodes the body of one frame
pub fn decode_payload(payload: &[u8]) -> Result<Message, TransportError> {
    if payload.len() >= 4 {
        let declared = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        if declared > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge {
                len: declared,
                max: MAX_FRAME_LEN,
            });
        }
    }

    let json = decompress_size_prepended(payload)?;
    serde_json::from_slice(&json).map_err(TransportError::Decode)
}

/// Reads exactly one frame, however the bytes are split across reads
pub async fn read_frame<R>(reader: &mut R) -> Result<Message, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    decode_payload(&payload)
}

pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Which end of the socket this process holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Accepted by a listening host; any bad frame kills the connection
    Accepted,
    /// Dialled out to a host; undecodable frames are skipped
    Connecting,
}

#[derive(Debug)]
enum Outbound {
    Frame(Message),
    Shutdown,
}

#[derive(Debug)]
struct ConnectionState {
    peer: String,
    alive: AtomicBool,
}

impl ConnectionState {
    /// Flags the connection dead; true only for the call that did it
    fn mark_dead(&self, reason: &str) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        if was_alive {
            warn!("Connection to {} is dead: {}", self.peer, reason);
        }
        was_alive
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// One message-oriented link to a remote process
///
/// Alive until the first transport failure, then permanently dead.
#[derive(Debug)]
pub struct Connection {
    side: Side,
    state: Arc<ConnectionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<Message>,
}

impl Connection {
    /// Dials `addr`, retrying a few times before giving up, and sends the
    /// `hello?` handshake
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!("Connected to {} on attempt {}", addr, attempt);
                    let connection = Self::spawn(stream, addr.to_string(), Side::Connecting);
                    connection.send(Message::question(HELLO_QUESTION));
                    return Ok(connection);
                }
                Err(e) => {
                    warn!("Connect attempt {} to {} failed: {}", attempt, addr, e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(TransportError::ConnectFailed {
            addr: addr.to_string(),
            attempts: CONNECT_ATTEMPTS,
        })
    }

    /// Wraps a socket accepted by a listening host
    pub fn accepted(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", peer, e);
        }
        Self::spawn(stream, peer, Side::Accepted)
    }

    /// Starts the reader and writer tasks over any byte stream
    pub fn spawn<S>(stream: S, peer: String, side: Side) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(ConnectionState {
            peer,
            alive: AtomicBool::new(true),
        });

        tokio::spawn(read_loop(
            reader,
            side,
            Arc::clone(&state),
            inbound_tx,
            outbound_tx.clone(),
        ));
        tokio::spawn(write_loop(writer, outbound_rx, Arc::clone(&state)));

        Self {
            side,
            state,
            outbound: outbound_tx,
            inbound: inbound_rx,
        }
    }

    pub fn peer(&self) -> &str {
        &self.state.peer
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Queues a message; never fails, silently drops once the link is dead
    pub fn send(&self, message: Message) {
        if !self.state.is_alive() {
            return;
        }
        if self.outbound.send(Outbound::Frame(message)).is_err() {
            self.state.mark_dead("writer task gone");
        }
    }

    pub fn send_answer(&self, answer: Answer) {
        self.send(Message::Answer(answer));
    }

    /// Takes every message received since the last drain
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbound.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Flags the connection dead; true only for the first call
    pub fn mark_dead(&self, reason: &str) -> bool {
        self.state.mark_dead(reason)
    }

    /// Shuts the socket down after already-queued frames are written
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Shutdown);
        self.state.mark_dead("closed locally");
    }
}

impl Drop for Connection {
    /// Shuts the write side so the remote sees EOF
    fn drop(&mut self) {
        let _ = self.outbound.send(Outbound::Shutdown);
    }
}

async fn read_loop<R>(
    mut reader: R,
    side: Side,
    state: Arc<ConnectionState>,
    inbound: mpsc::UnboundedSender<Message>,
    outbound: mpsc::UnboundedSender<Outbound>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Message::Question(question)) if question == HELLO_QUESTION => {
                debug!("Answering handshake from {}", state.peer);
                let answer = Answer {
                    hello: Some(HELLO_ANSWER.to_string()),
                    ..Default::default()
                };
                let _ = outbound.send(Outbound::Frame(Message::Answer(answer)));
            }
            Ok(Message::Answer(mut answer)) if answer.hello.is_some() => {
                answer.hello = None;
                debug!("Handshake with {} complete", state.peer);
                if !answer.is_empty() && inbound.send(Message::Answer(answer)).is_err() {
                    break;
                }
            }
            Ok(message) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Err(e @ (TransportError::Decode(_) | TransportError::Decompress(_)))
                if side == Side::Connecting =>
            {
                warn!("Skipping bad frame from {}: {}", state.peer, e);
            }
            Err(e) => {
                state.mark_dead(&e.to_string());
                break;
            }
        }

        if !state.is_alive() {
            break;
        }
    }
}

async fn write_loop<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Outbound>, state: Arc<ConnectionState>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(message) => {
                let frame = match encode_frame(&message) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Dropping unencodable message for {}: {}", state.peer, e);
                        continue;
                    }
                };
                if let Err(e) = writer.write_all(&frame).await {
                    state.mark_dead(&e.to_string());
                    break;
                }
                if let Err(e) = writer.flush().await {
                    state.mark_dead(&e.to_string());
                    break;
                }
            }
            Outbound::Shutdown => {
                let _ = writer.shutdown().await;
                break;
            }
        }
    }
}
