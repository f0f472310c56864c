use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::codec::LgtvCodec;
use crate::error::LgtvError;
use crate::frame::{CommandFrame, StatusFrame};

/// What the reader and writer tasks report back to the owner.
#[derive(Debug)]
pub enum LinkEvent {
    /// A complete status frame, in arrival order.
    Frame(StatusFrame),
    /// The TV closed the connection.
    Closed,
    /// Reading or writing failed.
    Failed(std::io::Error),
}

/// A TCP connection to a single TV.
///
/// The socket is split between a reader task (bytes → frames) and a writer
/// task fed by a channel, so writes are serialized no matter how many
/// senders exist. Both tasks are aborted when the connection is dropped.
#[derive(Debug)]
pub struct Connection {
    // Channel to send frames to background writer task
    tx: mpsc::Sender<CommandFrame>,
    // Channel to receive events from background reader/writer tasks
    rx: mpsc::Receiver<LinkEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let mut net_reader = FramedRead::new(read_half, LgtvCodec::new());
        let mut net_writer = FramedWrite::new(write_half, LgtvCodec::new());

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<CommandFrame>(32);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(100);
        let writer_events = network_tx.clone();

        // Writer task: User -> Network
        let writer = tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                trace!(%frame, "writing command");
                if let Err(e) = net_writer.send(frame).await {
                    let _ = writer_events.send(LinkEvent::Failed(into_io(e))).await;
                    break;
                }
            }
        });

        // Reader task: Network -> User
        let reader = tokio::spawn(async move {
            loop {
                let event = match net_reader.next().await {
                    Some(Ok(frame)) => LinkEvent::Frame(frame),
                    Some(Err(e)) => LinkEvent::Failed(into_io(e)),
                    None => LinkEvent::Closed,
                };
                let last = !matches!(event, LinkEvent::Frame(_));
                if network_tx.send(event).await.is_err() || last {
                    // owner dropped or stream finished
                    break;
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            reader,
            writer,
        }
    }

    /// Open a TCP connection, failing with `TimedOut` after `timeout`.
    pub async fn connect(info: &ConnectionInfo, timeout: Duration) -> Result<Self, std::io::Error> {
        debug!("connecting to {info}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect(info.to_string()))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {timeout:?}"),
                )
            })??;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Queue a frame for the writer task.
    pub async fn send(&self, frame: CommandFrame) -> Result<(), LgtvError> {
        self.tx.send(frame).await?;
        Ok(())
    }

    /// Next frame or lifecycle event; `None` once both tasks are gone.
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.rx.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn into_io(e: LgtvError) -> std::io::Error {
    match e {
        LgtvError::Connection(io) => io,
        other => std::io::Error::other(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
        let (conn, accepted) = tokio::join!(
            Connection::connect(&info, Duration::from_secs(5)),
            listener.accept()
        );
        (conn.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn connection_info_display() {
        let info = ConnectionInfo::new("192.168.1.56", 23);
        assert_eq!(info.to_string(), "192.168.1.56:23");
        assert_eq!(info.host(), "192.168.1.56");
        assert_eq!(info.port(), 23);
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut conn, mut tv) = pair().await;

        conn.send(CommandFrame::new("ka", 0, "ff")).await.unwrap();
        let mut buf = [0u8; 10];
        tv.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ka 00 ff\r\n");

        // split delivery is reassembled
        tv.write_all(b"a 01 OK").await.unwrap();
        tv.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tv.write_all(b"01x").await.unwrap();

        match conn.recv().await {
            Some(LinkEvent::Frame(frame)) => assert_eq!(frame.value(), "01"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn peer_close_is_reported() {
        let (mut conn, tv) = pair().await;
        drop(tv);
        assert!(matches!(conn.recv().await, Some(LinkEvent::Closed)));
    }

    #[tokio::test]
    async fn refused_connection_errors() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let info = ConnectionInfo::new("127.0.0.1", port);
        let err = Connection::connect(&info, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
    }
}
