//! Error types for the quote server.
//!
//! Startup failures ([`CorpusError`] and most of [`ListenerError`]) are fatal;
//! [`ServeError`] and [`ListenerError::Accept`] are confined to a single
//! connection or accept attempt and never stop the server.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while loading or querying the quote corpus.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The quote file does not exist.
    #[error("quote file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The quote file could not be opened or read.
    #[error("failed to read quote file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No quotes are available.
    #[error("quote corpus is empty")]
    Empty,
}

/// Errors raised by the listening socket.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener is already open")]
    AlreadyOpen,

    #[error("listener is not open")]
    NotOpen,

    #[error("no port was provided")]
    EmptyPort,

    #[error("could not resolve local address for port {port}: {reason}")]
    Resolve { port: String, reason: String },

    #[error("socket could not be bound: {0}")]
    Bind(#[source] io::Error),

    #[error("could not listen on socket: {0}")]
    Listen(#[source] io::Error),

    #[error("connection could not be established: {0}")]
    Accept(#[source] io::Error),

    #[error("socket could not be closed: {0}")]
    Close(#[source] io::Error),
}

/// Errors raised while serving one connection.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("no quote available: {0}")]
    EmptyCorpus(#[from] CorpusError),

    #[error("failed to drain request: {0}")]
    Drain(#[source] io::Error),

    #[error("failed to write quote: {0}")]
    Write(#[source] io::Error),
}
