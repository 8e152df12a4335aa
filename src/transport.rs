//! TCP transport client for the tracker connection.
//!
//! A thin, typed wrapper over one `TcpStream`: bounded connect,
//! non-blocking receive into an owned buffer, optional send, idempotent
//! close. The client never reconnects on its own: the ingestion service
//! owns the retry schedule, so a refused tracker costs one bounded
//! syscall per attempt instead of a hidden busy loop.
//!
//! # Lifecycle
//!
//! ```text
//! TransportClient::new(addr, port)          state: Disconnected
//!         │ connect()
//!         ├── ok ────────────────────────►  state: Connected
//!         └── err (refused/timeout) ─────►  state: Failed
//!
//! try_receive() → Ok(None)                  no data pending (WouldBlock)
//! try_receive() → Ok(Some(bytes))           one chunk, exactly the bytes read
//! try_receive() → Err(Closed)               peer closed; state: Disconnected
//! close()                                   idempotent; releases the socket
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use thiserror::Error;

use crate::constants::{CONNECT_TIMEOUT, RECV_BUFFER_SIZE};

/// Connection lifecycle state, observable by the caller between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket held; either never connected or cleanly closed.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Live socket, receive polling active.
    Connected,
    /// The last connect attempt or socket operation failed.
    Failed,
}

/// Connect failure. Recoverable; the caller retries on backoff.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The configured address did not resolve to a socket address.
    #[error("invalid tracker address {0:?}")]
    InvalidAddress(String),

    /// The connect attempt exceeded the bounded timeout.
    #[error("connect to {0} timed out")]
    TimedOut(SocketAddr),

    /// Refused, unreachable, or another OS-level failure.
    #[error("connect to {addr} failed: {source}")]
    Io {
        /// The address that was attempted.
        addr: SocketAddr,
        /// Underlying OS error.
        source: std::io::Error,
    },
}

/// Receive failure. Recoverable; triggers a reconnect next cycle.
#[derive(Debug, Error)]
pub enum RecvError {
    /// No live socket to read from.
    #[error("not connected")]
    NotConnected,

    /// The peer closed the connection.
    #[error("tracker closed the connection")]
    Closed,

    /// OS-level read failure.
    #[error("socket read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Send failure. Recoverable; triggers a reconnect next cycle.
#[derive(Debug, Error)]
pub enum SendError {
    /// No live socket to write to.
    #[error("not connected")]
    NotConnected,

    /// OS-level write failure.
    #[error("socket write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent TCP client for the tracker stream.
///
/// Owns exactly one socket handle and one receive buffer; reconnect
/// attempts replace the handle in place. Nothing here is shared or
/// static: one instance, one connection.
#[derive(Debug)]
pub struct TransportClient {
    address: String,
    port: u16,
    stream: Option<TcpStream>,
    state: ConnectionState,
    recv_buf: Vec<u8>,
}

impl TransportClient {
    /// Create a client for `address:port`. No connection is attempted.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            stream: None,
            state: ConnectionState::Disconnected,
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
        }
    }

    /// Attempt one bounded connect, replacing any previous socket.
    ///
    /// On success the socket is switched to non-blocking mode with
    /// `TCP_NODELAY` set, and state becomes [`ConnectionState::Connected`].
    /// On failure state becomes [`ConnectionState::Failed`] and the error
    /// is returned for the caller's backoff policy. Never panics, never
    /// blocks past [`CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// [`ConnectError`] describing resolution failure, timeout, or an
    /// OS-level refusal.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        self.close();
        self.state = ConnectionState::Connecting;

        let target = format!("{}:{}", self.address, self.port);
        let addr = match target.to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => {
                    self.state = ConnectionState::Failed;
                    return Err(ConnectError::InvalidAddress(target));
                }
            },
            Err(_) => {
                self.state = ConnectionState::Failed;
                return Err(ConnectError::InvalidAddress(target));
            }
        };

        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                // Non-blocking from here on: try_receive must never stall
                // the host frame loop.
                if let Err(source) = stream
                    .set_nonblocking(true)
                    .and_then(|()| stream.set_nodelay(true))
                {
                    self.state = ConnectionState::Failed;
                    return Err(ConnectError::Io { addr, source });
                }
                log::info!("[transport] connected to {addr}");
                self.stream = Some(stream);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(source) => {
                self.state = ConnectionState::Failed;
                if source.kind() == ErrorKind::TimedOut {
                    Err(ConnectError::TimedOut(addr))
                } else {
                    Err(ConnectError::Io { addr, source })
                }
            }
        }
    }

    /// Poll for pending data without blocking.
    ///
    /// Returns at most one chunk per call, sliced to exactly the bytes
    /// read this call, never the full buffer with a stale tail. No data
    /// pending is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`RecvError::Closed`] when the peer has closed (state moves to
    /// `Disconnected`), [`RecvError::Io`] on an OS read failure (state
    /// moves to `Failed`). Both mean the caller should reconnect.
    pub fn try_receive(&mut self) -> Result<Option<&[u8]>, RecvError> {
        let stream = self.stream.as_mut().ok_or(RecvError::NotConnected)?;

        match stream.read(&mut self.recv_buf) {
            Ok(0) => {
                log::info!("[transport] tracker closed the connection");
                self.close();
                Err(RecvError::Closed)
            }
            Ok(n) => Ok(Some(&self.recv_buf[..n])),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => {
                self.stream = None;
                self.state = ConnectionState::Failed;
                Err(RecvError::Io(e))
            }
        }
    }

    /// Send bytes to the tracker (acknowledgement path).
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] without a live socket, [`SendError::Io`]
    /// on an OS write failure (state moves to `Failed`).
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        let stream = self.stream.as_mut().ok_or(SendError::NotConnected)?;
        match stream.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stream = None;
                self.state = ConnectionState::Failed;
                Err(SendError::Io(e))
            }
        }
    }

    /// Release the socket. Idempotent and safe to call at any time.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True when a live socket is held.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.stream.is_some()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;

    fn loopback_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn connect_refused_is_reported_not_fatal() {
        // Bind then drop to obtain a port nothing listens on.
        let (listener, port) = loopback_listener();
        drop(listener);

        let mut client = TransportClient::new("127.0.0.1", port);
        let err = client.connect().unwrap_err();
        assert!(matches!(err, ConnectError::Io { .. } | ConnectError::TimedOut(_)));
        assert_eq!(client.state(), ConnectionState::Failed);
        assert!(!client.is_connected());
    }

    #[test]
    fn invalid_address_is_typed() {
        let mut client = TransportClient::new("not an address", 1);
        assert!(matches!(client.connect(), Err(ConnectError::InvalidAddress(_))));
    }

    #[test]
    fn receive_returns_exactly_the_bytes_read() {
        let (listener, port) = loopback_listener();
        let mut client = TransportClient::new("127.0.0.1", port);
        client.connect().unwrap();
        let (mut server, _) = listener.accept().unwrap();

        server.write_all(b"abc").unwrap();
        server.flush().unwrap();

        // Non-blocking: poll until the bytes arrive.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            match client.try_receive().unwrap() {
                Some(chunk) => {
                    assert_eq!(chunk, b"abc");
                    break;
                }
                None => {
                    assert!(std::time::Instant::now() < deadline, "no data before deadline");
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            }
        }
    }

    #[test]
    fn no_pending_data_is_none_not_error() {
        let (listener, port) = loopback_listener();
        let mut client = TransportClient::new("127.0.0.1", port);
        client.connect().unwrap();
        let _server = listener.accept().unwrap();

        assert!(client.try_receive().unwrap().is_none());
        assert!(client.is_connected());
    }

    #[test]
    fn peer_close_moves_to_disconnected() {
        let (listener, port) = loopback_listener();
        let mut client = TransportClient::new("127.0.0.1", port);
        client.connect().unwrap();
        let (server, _) = listener.accept().unwrap();
        drop(server);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            match client.try_receive() {
                Err(RecvError::Closed) => break,
                Ok(None) => {
                    assert!(std::time::Instant::now() < deadline, "close not observed");
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                other => panic!("unexpected receive result: {other:?}"),
            }
        }
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn send_reaches_the_peer() {
        let (listener, port) = loopback_listener();
        let mut client = TransportClient::new("127.0.0.1", port);
        client.connect().unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.send(b"ack").unwrap();
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ack");
    }

    #[test]
    fn close_is_idempotent() {
        let mut client = TransportClient::new("127.0.0.1", 1);
        client.close();
        client.close();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(client.try_receive(), Err(RecvError::NotConnected)));
        assert!(matches!(client.send(b"x"), Err(SendError::NotConnected)));
    }
}
