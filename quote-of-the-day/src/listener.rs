use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tracing::{debug, warn};

use crate::{error::ListenerError, signal::QuitFlag};

/// The server is serial, so one pending connection is enough.
const BACKLOG: u32 = 1;

/// Result of a bounded accept.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted(TcpStream, SocketAddr),
    /// The timeout elapsed with no client.
    TimedOut,
    /// The quit flag was raised while waiting.
    Interrupted,
}

/// Owns the listening socket. Starts closed; `open` and `close` may be called
/// in any order, and `close` on a closed listener is a no-op.
#[derive(Debug)]
pub struct Listener {
    host: Ipv4Addr,
    bound: Option<Bound>,
}

#[derive(Debug)]
struct Bound {
    listener: TcpListener,
    resolved: SocketAddr,
}

impl Listener {
    pub fn new(host: Ipv4Addr) -> Self {
        Self { host, bound: None }
    }

    pub fn is_open(&self) -> bool {
        self.bound.is_some()
    }

    /// Binds an IPv4 stream socket on `port` and starts listening.
    ///
    /// `"0"` asks the OS for an ephemeral port; use [`Listener::local_addr`]
    /// to learn which one was picked.
    pub async fn open(&mut self, port: &str) -> Result<SocketAddr, ListenerError> {
        if self.bound.is_some() {
            return Err(ListenerError::AlreadyOpen);
        }
        if port.is_empty() {
            return Err(ListenerError::EmptyPort);
        }

        let resolved = self.resolve(port).await?;

        let socket = TcpSocket::new_v4().map_err(ListenerError::Bind)?;
        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(resolved).map_err(ListenerError::Bind)?;
        let listener = socket.listen(BACKLOG).map_err(ListenerError::Listen)?;
        let local = listener.local_addr().map_err(ListenerError::Listen)?;

        debug!(%resolved, %local, "listener open");
        self.bound = Some(Bound { listener, resolved });
        Ok(local)
    }

    async fn resolve(&self, port: &str) -> Result<SocketAddr, ListenerError> {
        let resolve_error = |reason: String| ListenerError::Resolve {
            port: port.to_string(),
            reason,
        };

        let number: u16 = port
            .parse()
            .map_err(|err| resolve_error(format!("invalid port: {err}")))?;

        lookup_host((self.host, number))
            .await
            .map_err(|err| resolve_error(err.to_string()))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| resolve_error("no IPv4 address available".to_string()))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        let bound = self.bound.as_ref().ok_or(ListenerError::NotOpen)?;
        bound.listener.local_addr().map_err(ListenerError::Listen)
    }

    /// Waits up to `timeout` for a client.
    ///
    /// Returns [`AcceptOutcome::Interrupted`] as soon as `quit` is raised,
    /// including when it was already raised on entry.
    pub async fn try_accept(
        &self,
        timeout: Duration,
        quit: &QuitFlag,
    ) -> Result<AcceptOutcome, ListenerError> {
        let bound = self.bound.as_ref().ok_or(ListenerError::NotOpen)?;
        if quit.is_requested() {
            return Ok(AcceptOutcome::Interrupted);
        }

        tokio::select! {
            biased;
            _ = quit.wait() => Ok(AcceptOutcome::Interrupted),
            accepted = bound.listener.accept() => match accepted {
                Ok((stream, peer)) => Ok(AcceptOutcome::Accepted(stream, peer)),
                Err(err) => Err(ListenerError::Accept(err)),
            },
            _ = tokio::time::sleep(timeout) => Ok(AcceptOutcome::TimedOut),
        }
    }

    /// Closes the socket and forgets the resolved address.
    pub fn close(&mut self) -> Result<(), ListenerError> {
        let Some(Bound { listener, resolved }) = self.bound.take() else {
            return Ok(());
        };

        let socket = listener.into_std().map_err(ListenerError::Close)?;
        if let Some(pending) = socket.take_error().map_err(ListenerError::Close)? {
            warn!(error = %pending, "listening socket had a pending error");
        }
        drop(socket);

        debug!(%resolved, "listener closed");
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED)
    }
}
