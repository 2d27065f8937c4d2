//! RFC 865 Quote of the Day server.
//!
//! Every client that connects gets one randomly chosen line from a quote
//! file, after which the server closes the connection. Clients are handled
//! one at a time.
//!
//! - [`cli`] parses the command line into a [`server::ServerConfig`].
//! - [`corpus`] loads the quote file and picks quotes.
//! - [`listener`] owns the listening socket and offers a bounded,
//!   interruptible accept.
//! - [`handler`] drains a connection, writes a quote and closes it.
//! - [`signal`] holds the quit flag and routes SIGINT/SIGTERM to it.
//! - [`server`] ties the pieces into the start/serve/close lifecycle.

pub mod cli;
pub mod corpus;
pub mod error;
pub mod handler;
pub mod listener;
pub mod server;
pub mod signal;
