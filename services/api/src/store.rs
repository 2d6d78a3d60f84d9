//! Knowledge Store
//!
//! A durable mapping from agent id to [`KnowledgeRecord`]. The store is an
//! interface so it can be backed by any keyed resource; the default backend
//! is a single JSON file in the `agents.json` shape the agent process reads:
//! `{ "<id>": { "name": ..., "content": ... } }`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studeo_core::knowledge::KnowledgeRecord;
use tokio::sync::Mutex;

/// Interface over the durable knowledge mapping.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Returns the full mapping. An absent backing resource is an empty
    /// mapping, not an error.
    async fn list(&self) -> Result<BTreeMap<String, KnowledgeRecord>>;

    /// Looks up one record by id.
    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>>;

    /// Inserts or replaces the record under its id. Last write wins.
    async fn upsert(&self, record: KnowledgeRecord) -> Result<()>;
}

/// On-disk value type. The id lives in the surrounding map key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    name: String,
    content: String,
}

/// File-backed store. Upserts are read-modify-write of the whole map, so
/// they are serialized through a mutex; without it two concurrent upserts
/// could each load the old map and one update would be lost.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, StoredRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("knowledge store at {} is corrupt", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to read knowledge store at {}", self.path.display())
            }),
        }
    }
}

#[async_trait]
impl KnowledgeStore for JsonFileStore {
    async fn list(&self) -> Result<BTreeMap<String, KnowledgeRecord>> {
        let map = self.load().await?;
        Ok(map
            .into_iter()
            .map(|(id, stored)| {
                let record = KnowledgeRecord {
                    id: id.clone(),
                    name: stored.name,
                    content: stored.content,
                };
                (id, record)
            })
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<KnowledgeRecord>> {
        let mut map = self.load().await?;
        Ok(map.remove(id).map(|stored| KnowledgeRecord {
            id: id.to_string(),
            name: stored.name,
            content: stored.content,
        }))
    }

    async fn upsert(&self, record: KnowledgeRecord) -> Result<()> {
        // Held across the full read-modify-write cycle.
        let _guard = self.write_lock.lock().await;

        let mut map = self.load().await?;
        map.insert(
            record.id.clone(),
            StoredRecord {
                name: record.name,
                content: record.content,
            },
        );

        let json = serde_json::to_vec_pretty(&map)?;
        // Write-then-rename so a reader never observes a torn map.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await.with_context(|| {
            format!("failed to write knowledge store at {}", tmp.display())
        })?;
        tokio::fs::rename(&tmp, &self.path).await.with_context(|| {
            format!("failed to replace knowledge store at {}", self.path.display())
        })?;
        Ok(())
    }
}
