//! TCP server for the echo/checksum protocol.
//!
//! The supervisor creates a listening socket, runs the accept loop on it and,
//! whenever setup or accept fails, drops the socket and starts over. It never
//! returns; the process ends only when it is signalled.

use crate::config::Config;
use crate::protocol::handle_connection;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Pending-accept queue depth. Does not limit active connections.
pub const LISTEN_BACKLOG: i32 = 8;

/// Errors that end a listen cycle, plus address resolution at startup.
#[derive(Debug)]
pub enum ServerError {
    InvalidAddress(String, std::net::AddrParseError),
    Socket(io::Error),
    ReuseAddress(io::Error),
    Bind(SocketAddr, io::Error),
    Listen(io::Error),
    Register(io::Error),
    Accept(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::InvalidAddress(addr, e) => {
                write!(f, "Invalid listen address '{}': {}", addr, e)
            }
            ServerError::Socket(e) => write!(f, "Failed to create socket: {}", e),
            ServerError::ReuseAddress(e) => write!(f, "Failed to set SO_REUSEADDR: {}", e),
            ServerError::Bind(addr, e) => write!(f, "Failed to bind {}: {}", addr, e),
            ServerError::Listen(e) => write!(f, "Failed to listen: {}", e),
            ServerError::Register(e) => {
                write!(f, "Failed to register listener with runtime: {}", e)
            }
            ServerError::Accept(e) => write!(f, "Failed to accept connection: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::InvalidAddress(_, e) => Some(e),
            ServerError::Socket(e)
            | ServerError::ReuseAddress(e)
            | ServerError::Bind(_, e)
            | ServerError::Listen(e)
            | ServerError::Register(e)
            | ServerError::Accept(e) => Some(e),
        }
    }
}

/// Server instance
pub struct Server {
    addr: SocketAddr,
    read_deadline: Option<Duration>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: &Config) -> Result<Self, ServerError> {
        let addr = config
            .listen
            .parse()
            .map_err(|e| ServerError::InvalidAddress(config.listen.clone(), e))?;

        Ok(Server {
            addr,
            read_deadline: config.read_deadline(),
        })
    }

    /// Serve forever, restarting the listen cycle after every failure.
    ///
    /// There is no backoff between cycles; the task only yields so other
    /// tasks on the runtime keep running. A failure is logged at `warn` when
    /// it differs from the previous one and at `debug` when it repeats.
    pub async fn run(&self) {
        let mut cycle: u64 = 0;
        let mut failures = CycleFailures::default();

        loop {
            cycle += 1;

            let Err(e) = self.serve_once(cycle).await;
            if failures.record(&e) {
                warn!(cycle, error = %e, "Listen cycle ended, restarting");
            } else {
                debug!(cycle, error = %e, "Listen cycle ended, restarting");
            }

            tokio::task::yield_now().await;
        }
    }

    /// One listen cycle. The listener is closed when this returns.
    async fn serve_once(&self, cycle: u64) -> Result<Infallible, ServerError> {
        let listener = create_listener(self.addr)?;
        if cycle == 1 {
            info!(address = %self.addr, backlog = LISTEN_BACKLOG, "Server listening");
        } else {
            debug!(address = %self.addr, cycle, "Server listening again");
        }

        accept_loop(listener, self.read_deadline).await
    }
}

/// Tracks the last listen-cycle failure so repeats can be logged quietly.
#[derive(Debug, Default)]
struct CycleFailures {
    last: Option<(std::mem::Discriminant<ServerError>, Option<io::ErrorKind>)>,
}

impl CycleFailures {
    /// Record a failure. Returns true if it differs from the previous one.
    fn record(&mut self, error: &ServerError) -> bool {
        let key = (std::mem::discriminant(error), error.io_kind());
        self.last.replace(key) != Some(key)
    }
}

impl ServerError {
    fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ServerError::InvalidAddress(..) => None,
            ServerError::Socket(e)
            | ServerError::ReuseAddress(e)
            | ServerError::Bind(_, e)
            | ServerError::Listen(e)
            | ServerError::Register(e)
            | ServerError::Accept(e) => Some(e.kind()),
        }
    }
}

/// Create a listening socket with SO_REUSEADDR and the fixed backlog.
///
/// Must be called from within a tokio runtime.
pub fn create_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )
    .map_err(ServerError::Socket)?;

    socket
        .set_reuse_address(true)
        .map_err(ServerError::ReuseAddress)?;
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Bind(addr, e))?;
    socket.listen(LISTEN_BACKLOG).map_err(ServerError::Listen)?;
    socket.set_nonblocking(true).map_err(ServerError::Register)?;

    TcpListener::from_std(socket.into()).map_err(ServerError::Register)
}

/// Accept connections until `accept` fails, handing each to its own task.
///
/// Spawned handlers are detached: the loop keeps no handle to them or their
/// streams, and their failures never reach it.
pub async fn accept_loop(
    listener: TcpListener,
    read_deadline: Option<Duration>,
) -> Result<Infallible, ServerError> {
    loop {
        let (stream, peer) = listener.accept().await.map_err(ServerError::Accept)?;
        debug!(peer = %peer, "New connection");

        tokio::spawn(async move {
            match handle_connection(stream, read_deadline).await {
                Ok(()) => debug!(peer = %peer, "Connection closed"),
                Err(e) => debug!(peer = %peer, error = %e, "Connection error"),
            }
        });
    }
}
