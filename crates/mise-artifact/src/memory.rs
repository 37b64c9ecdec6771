use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{ByteStream, Error, Store, collect};

/// In-memory artifact store for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
  objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
    keys.sort();
    keys
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let data = self
      .objects
      .read()
      .await
      .get(key)
      .cloned()
      .ok_or_else(|| Error::NotFound(key.to_string()))?;
    Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    let data = collect(data).await?;
    self.objects.write().await.insert(key.to_string(), data);
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    self
      .objects
      .write()
      .await
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(key.to_string()))
  }
}
