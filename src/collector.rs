//! # Item Collection
//!
//! The collector decides which items a flow step runs against. The runner only needs a
//! finite, lazily consumed sequence of identifiers whose length is known up front so
//! progress and completeness can be measured against it.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors raised when item discovery cannot run
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Collector query failed for flow '{flow}' step {step}: {reason}")]
    Query {
        flow: String,
        step: u32,
        reason: String,
    },

    #[error("Failed to read items from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Collected item identifiers, consumed once in source order
pub struct ItemQueue {
    len: usize,
    items: Box<dyn Iterator<Item = String> + Send>,
}

impl ItemQueue {
    /// Wrap a lazy iterator that will yield exactly `len` identifiers
    pub fn new(len: usize, items: impl Iterator<Item = String> + Send + 'static) -> Self {
        Self {
            len,
            items: Box::new(items),
        }
    }

    pub fn from_vec(items: Vec<String>) -> Self {
        Self::new(items.len(), items.into_iter())
    }

    /// Number of identifiers discovered
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Iterator for ItemQueue {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.items.next()
    }
}

impl fmt::Debug for ItemQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemQueue").field("len", &self.len).finish()
    }
}

/// Produces the item identifiers for one step of a flow
pub trait ItemSource: Send + Sync {
    fn collect(&self, flow_name: &str, step: u32) -> Result<ItemQueue, CollectionError>;
}

/// Fixed, in-memory list of identifiers
#[derive(Debug, Clone, Default)]
pub struct VecItemSource {
    items: Vec<String>,
}

impl VecItemSource {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

impl ItemSource for VecItemSource {
    fn collect(&self, flow_name: &str, step: u32) -> Result<ItemQueue, CollectionError> {
        debug!(flow = flow_name, step, items = self.items.len(), "Collected in-memory items");
        Ok(ItemQueue::from_vec(self.items.clone()))
    }
}

/// Newline-delimited identifiers streamed from disk.
///
/// The file is read twice: once to count identifiers, then lazily while batches are
/// dispatched, so the identifiers never have to fit in memory at once. Blank lines are
/// skipped.
#[derive(Debug, Clone)]
pub struct FileItemSource {
    path: PathBuf,
}

impl FileItemSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<BufReader<File>, CollectionError> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|source| CollectionError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

fn is_identifier(line: &str) -> bool {
    !line.trim().is_empty()
}

impl ItemSource for FileItemSource {
    fn collect(&self, flow_name: &str, step: u32) -> Result<ItemQueue, CollectionError> {
        let mut len = 0;
        for line in self.open()?.lines() {
            let line = line.map_err(|source| CollectionError::Io {
                path: self.path.clone(),
                source,
            })?;
            if is_identifier(&line) {
                len += 1;
            }
        }

        debug!(
            flow = flow_name,
            step,
            items = len,
            path = %self.path.display(),
            "Counted items on disk"
        );

        let path = self.path.clone();
        let items = self
            .open()?
            .lines()
            .map_while(move |line| match line {
                Ok(line) => Some(line),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Stopped reading items");
                    None
                }
            })
            .filter(|line| is_identifier(line))
            .map(|line| line.trim().to_string());

        Ok(ItemQueue::new(len, items))
    }
}
