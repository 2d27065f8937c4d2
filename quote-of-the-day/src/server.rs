//! Server lifecycle: `Idle -> Listening -> Draining -> Closed`.
//!
//! [`Server::start`] opens the listener and loads the corpus. [`Server::serve`]
//! accepts and answers clients one at a time until the quit flag is raised,
//! then releases both resources. A connection that was already accepted is
//! always answered before the flag is looked at again.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{
    corpus::QuoteCorpus,
    handler,
    listener::{AcceptOutcome, Listener},
    signal::QuitFlag,
};

pub const DEFAULT_PORT: u16 = 17;
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Pause after a failed accept so a persistent error (EMFILE and friends)
/// does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: String,
    pub quote_file: PathBuf,
    /// Upper bound on a single accept wait; also bounds how long a raised
    /// quit flag can go unnoticed.
    pub accept_timeout: Duration,
    pub drain_timeout: Duration,
}

impl ServerConfig {
    pub fn new(quote_file: impl Into<PathBuf>) -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT.to_string(),
            quote_file: quote_file.into(),
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Listening,
    Draining,
    Closed,
}

pub struct Server {
    config: ServerConfig,
    listener: Listener,
    corpus: QuoteCorpus,
    quit: QuitFlag,
    state: LifecycleState,
    served: u64,
}

impl Server {
    pub fn new(config: ServerConfig, quit: QuitFlag) -> Self {
        Self {
            listener: Listener::new(config.host),
            config,
            corpus: QuoteCorpus::default(),
            quit,
            state: LifecycleState::Idle,
            served: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub fn quit_flag(&self) -> &QuitFlag {
        &self.quit
    }

    /// Starts, serves until asked to quit, then closes.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        self.serve().await
    }

    /// Opens the listener and loads the corpus.
    ///
    /// On failure whatever was acquired is released and the server ends up
    /// `Closed`.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        ensure!(
            self.state == LifecycleState::Idle,
            "server cannot start from state {:?}",
            self.state
        );

        match self.acquire().await {
            Ok(addr) => {
                self.state = LifecycleState::Listening;
                info!("quote server listening on {addr}");
                Ok(addr)
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    async fn acquire(&mut self) -> Result<SocketAddr> {
        let addr = self
            .listener
            .open(&self.config.port)
            .await
            .with_context(|| format!("failed to open server socket on port {}", self.config.port))?;

        self.corpus = QuoteCorpus::load(&self.config.quote_file)
            .await
            .context("quotes file could not be loaded")?;
        info!(
            path = %self.config.quote_file.display(),
            quotes = self.corpus.len(),
            "quotes loaded"
        );

        Ok(addr)
    }

    /// Accept loop. Runs until the quit flag is raised, then closes.
    pub async fn serve(&mut self) -> Result<()> {
        ensure!(
            self.state == LifecycleState::Listening,
            "server cannot serve from state {:?}",
            self.state
        );

        while !self.quit.is_requested() {
            match self
                .listener
                .try_accept(self.config.accept_timeout, &self.quit)
                .await
            {
                Ok(AcceptOutcome::Accepted(stream, peer)) => self.answer(stream, peer).await,
                Ok(AcceptOutcome::TimedOut) => {}
                Ok(AcceptOutcome::Interrupted) => debug!("accept interrupted"),
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    self.back_off(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        self.state = LifecycleState::Draining;
        self.close();
        Ok(())
    }

    // Cut short when quit is raised.
    async fn back_off(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.quit.wait() => {}
        }
    }

    async fn answer(&mut self, stream: TcpStream, peer: SocketAddr) {
        match handler::serve(stream, &self.corpus, self.config.drain_timeout).await {
            Ok(quote) => {
                self.served += 1;
                info!(%peer, %quote, "answered client request");
            }
            Err(err) => warn!(%peer, error = %err, "client connection closed with error"),
        }
    }

    /// Releases the listener and the corpus. Runs once; later calls do
    /// nothing.
    pub fn close(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }

        if let Err(err) = self.listener.close() {
            warn!(error = %err, "server socket could not be closed");
        }
        self.corpus.unload();

        self.state = LifecycleState::Closed;
        info!(served = self.served, "server closed");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}
