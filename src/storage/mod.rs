// src/storage/mod.rs

//! Record sinks and output batching.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Listing;

pub mod jsonl;

pub use jsonl::JsonlSink;

/// Destination for accepted records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one batch. Order within a batch is preserved.
    async fn push_batch(&self, records: &[Listing]) -> Result<()>;
}

/// Buffers records and flushes them to the sink in fixed-size batches.
///
/// Callers must invoke [`flush`](Self::flush) at the end of a run; whatever
/// remains in the buffer is written as a short final batch.
pub struct BatchWriter {
    sink: Arc<dyn RecordSink>,
    buffer: Vec<Listing>,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(sink: Arc<dyn RecordSink>, batch_size: usize) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub async fn push(&mut self, record: Listing) -> Result<()> {
        self.buffer.push(record);
        while self.buffer.len() >= self.batch_size {
            let batch: Vec<Listing> = self.buffer.drain(..self.batch_size).collect();
            self.sink.push_batch(&batch).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch: Vec<Listing> = self.buffer.drain(..).collect();
        self.sink.push_batch(&batch).await?;
        Ok(())
    }
}

/// In-memory sink, used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Listing>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records pushed so far, in arrival order.
    pub fn records(&self) -> Vec<Listing> {
        match self.batches.lock() {
            Ok(batches) => batches.iter().flatten().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Sizes of the batches as they were pushed.
    pub fn batch_sizes(&self) -> Vec<usize> {
        match self.batches.lock() {
            Ok(batches) => batches.iter().map(Vec::len).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn push_batch(&self, records: &[Listing]) -> Result<()> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(records.to_vec());
        }
        Ok(())
    }
}
