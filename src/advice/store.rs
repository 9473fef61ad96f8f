//! JSON file of previously generated advice, keyed by payload.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::advice::prompt::AdvicePayload;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAdvice {
    pub created_at: String,
    /// Kept as raw JSON so entries written by older payload shapes still load.
    pub payload: serde_json::Value,
    pub advice: String,
}

pub struct AdviceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AdviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All readable entries. Missing or corrupt files read as empty; entries
    /// that do not parse are skipped.
    pub async fn load(&self) -> Vec<StoredAdvice> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "advice store unreadable: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "advice store is not a JSON array; ignoring");
                Vec::new()
            }
        }
    }

    /// Non-empty advice previously stored for an equal payload.
    pub async fn find(&self, payload: &AdvicePayload) -> Option<String> {
        let key = serde_json::to_value(payload).ok()?;
        self.load()
            .await
            .into_iter()
            .find(|e| e.payload == key && !e.advice.trim().is_empty())
            .map(|e| e.advice.trim().to_string())
    }

    /// Append an entry and rewrite the file through a temp file + rename.
    pub async fn append(&self, payload: &AdvicePayload, advice: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        entries.push(StoredAdvice {
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            payload: serde_json::to_value(payload)?,
            advice: advice.to_string(),
        });

        let body = serde_json::to_string_pretty(&entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = entries.len(), "advice stored");
        Ok(())
    }
}
