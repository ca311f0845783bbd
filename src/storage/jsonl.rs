// src/storage/jsonl.rs

//! JSON Lines sink, one listing per line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Listing;
use crate::storage::RecordSink;

pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Open a sink at `path`, creating parent directories. An existing file
    /// is appended to, so interrupted runs can be resumed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn push_batch(&self, records: &[Listing]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}
