//! Mise Artifact
//!
//! This crate provides the artifact storage trait and implementations for mise.
//! Artifacts are binary blobs (generated images, video frames, files) that are
//! stored separately from the execution record. Node outputs carry only the
//! artifact key.
//!
//! The [`Store`] trait defines the backend layer for artifact storage.
//! Implementations handle the actual storage (filesystem, memory, object
//! storage) while the engine decides the keys.
//!
//! The trait uses async streaming for efficient handling of large files.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of bytes for artifact data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested artifact was not found.
  #[error("artifact not found: {0}")]
  NotFound(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Artifact storage trait.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an artifact by key.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an artifact, replacing any previous content under the same key.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Delete an artifact by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// Store an in-memory buffer.
  async fn put_bytes(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), Error> {
    let stream: ByteStream = Box::pin(futures::stream::once(async move { Ok(data) }));
    self.put(key, stream, content_type).await
  }
}

/// Drain a byte stream into a single buffer.
pub async fn collect(mut stream: ByteStream) -> Result<Bytes, Error> {
  let mut buffer = Vec::new();
  while let Some(chunk) = stream.next().await {
    buffer.extend_from_slice(&chunk?);
  }
  Ok(Bytes::from(buffer))
}
