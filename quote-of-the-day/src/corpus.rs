use std::{fmt, io, path::Path, sync::Arc};

use rand::Rng;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::debug;

use crate::error::CorpusError;

/// A single quote line with its terminator removed. Never empty.
///
/// Stored as the raw bytes of the file; no encoding is assumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote(Arc<[u8]>);

impl Quote {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl PartialEq<&str> for Quote {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == other.as_bytes()
    }
}

impl PartialEq<&[u8]> for Quote {
    fn eq(&self, other: &&[u8]) -> bool {
        &*self.0 == *other
    }
}

/// The in-memory set of quotes, kept in file order.
#[derive(Debug, Default)]
pub struct QuoteCorpus {
    quotes: Vec<Quote>,
}

impl QuoteCorpus {
    /// Loads every non-blank line of `path` as a quote.
    ///
    /// Fails with [`CorpusError::Empty`] when the file holds no non-blank
    /// line. Nothing is retained on failure.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => CorpusError::NotFound {
                path: path.to_path_buf(),
            },
            _ => CorpusError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let mut reader = BufReader::new(file);
        let mut quotes = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            let bytes = reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|source| CorpusError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            if bytes == 0 {
                break;
            }

            let stripped = strip_terminator(&line);
            if !stripped.is_empty() {
                quotes.push(Quote(Arc::from(stripped)));
            }
        }

        if quotes.is_empty() {
            return Err(CorpusError::Empty);
        }

        debug!(path = %path.display(), count = quotes.len(), "loaded quotes");
        Ok(Self { quotes })
    }

    pub fn from_lines<I, S>(lines: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let quotes: Vec<Quote> = lines
            .into_iter()
            .filter_map(|line| {
                let stripped = strip_terminator(line.as_ref());
                (!stripped.is_empty()).then(|| Quote(Arc::from(stripped)))
            })
            .collect();

        if quotes.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(Self { quotes })
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Picks a quote uniformly at random using the thread-local generator.
    pub fn pick_random(&self) -> Result<Quote, CorpusError> {
        self.pick_random_with(&mut rand::thread_rng())
    }

    pub fn pick_random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Quote, CorpusError> {
        if self.quotes.is_empty() {
            return Err(CorpusError::Empty);
        }
        let index = rng.gen_range(0..self.quotes.len());
        Ok(self.quotes[index].clone())
    }

    /// Releases every quote. Safe to call repeatedly or on a corpus that was
    /// never loaded.
    pub fn unload(&mut self) {
        self.quotes = Vec::new();
    }
}

// Strips one trailing `\n` (or `\r\n`).
fn strip_terminator(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => line,
    }
}
