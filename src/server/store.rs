//! Session-scoped mapping from original file names to temporary storage names

use anyhow::Result;
use dashmap::DashMap;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Remembers the generated temporary storage name for each in-progress
/// upload, keyed by the original file name. Scoped to the server process,
/// the analogue of one browser session: chunk 0 always assigns a fresh
/// name, so a restarted upload never appends to stale data.
#[derive(Default)]
pub struct TempNameStore {
    names: DashMap<String, String>,
}

impl TempNameStore {
    /// Generate and remember a fresh temporary name for `file_name`,
    /// retrying until the candidate does not already exist under `dir`
    pub async fn assign(&self, file_name: &str, dir: &Path) -> Result<String> {
        let temp_name = loop {
            let candidate = format!("{}.{}", file_name, Uuid::new_v4().simple());
            if !tokio::fs::try_exists(dir.join(&candidate)).await? {
                break candidate;
            }
        };

        debug!(
            target: "server::store",
            file = %file_name,
            temp = %temp_name,
            "Assigned temporary storage name"
        );
        self.names.insert(file_name.to_string(), temp_name.clone());
        Ok(temp_name)
    }

    /// Temporary name previously assigned for `file_name`, if any
    pub fn get(&self, file_name: &str) -> Option<String> {
        self.names.get(file_name).map(|entry| entry.clone())
    }
}
