//! services/api/src/adapters/settings.rs
//!
//! Persists the user's settings (API key, model, opt-in flag) as a JSON file,
//! implementing the `SettingsService` port.

use async_trait::async_trait;
use document_analyzer_core::domain::Settings;
use document_analyzer_core::ports::{SettingsError, SettingsService};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

pub struct JsonSettingsStore {
    path: PathBuf,
    // Serializes writers so a save and a clear can't interleave on disk.
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SettingsService for JsonSettingsStore {
    async fn load(&self) -> Result<Settings, SettingsError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
            Err(e) => return Err(SettingsError::Read(e.to_string())),
        };
        // A damaged file falls back to defaults rather than locking the user out.
        Ok(serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Ignoring unreadable settings file: {}", e);
            Settings::default()
        }))
    }

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_vec_pretty(settings)
            .map_err(|e| SettingsError::Write(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SettingsError::Write(e.to_string()))?;
        }

        // Write to a sibling temp file, then rename over the original.
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| SettingsError::Write(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| SettingsError::Write(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SettingsError::Write(e.to_string())),
        }
    }
}
