use std::{io, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{Instant, timeout_at},
};
use tracing::debug;

use crate::{
    corpus::{Quote, QuoteCorpus},
    error::ServeError,
};

const DRAIN_CHUNK_SIZE: usize = 256;

/// Serves one client: drain whatever it sent, reply with a random quote,
/// close.
///
/// The connection is shut down and dropped on every path, including when
/// the write fails.
pub async fn serve<S>(
    mut conn: S,
    corpus: &QuoteCorpus,
    drain_timeout: Duration,
) -> Result<Quote, ServeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = respond(&mut conn, corpus, drain_timeout).await;
    if let Err(err) = conn.shutdown().await {
        debug!(error = %err, "connection shutdown failed");
    }
    result
}

async fn respond<S>(
    conn: &mut S,
    corpus: &QuoteCorpus,
    drain_timeout: Duration,
) -> Result<Quote, ServeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let drained = drain(conn, drain_timeout)
        .await
        .map_err(ServeError::Drain)?;
    debug!(bytes = drained, "request drained");

    let quote = corpus.pick_random()?;
    conn.write_all(quote.as_bytes())
        .await
        .map_err(ServeError::Write)?;
    conn.flush().await.map_err(ServeError::Write)?;
    Ok(quote)
}

/// Reads and discards input until EOF or until `limit` has elapsed,
/// returning how many bytes were thrown away.
pub async fn drain<R>(reader: &mut R, limit: Duration) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + limit;
    let mut chunk = [0u8; DRAIN_CHUNK_SIZE];
    let mut total = 0;

    loop {
        match timeout_at(deadline, reader.read(&mut chunk)).await {
            Ok(Ok(0)) | Err(_) => return Ok(total),
            Ok(Ok(read)) => total += read,
            Ok(Err(err)) => return Err(err),
        }
    }
}
