use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use pool_common::Settings;

/// JSON file persistence for the settings document. Loads never fail:
/// a missing file yields defaults and a corrupt one is logged and replaced
/// with defaults on the next save. Saves stamp `last_updated` in UTC.
#[derive(Clone)]
pub struct SettingsStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("POOL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.pool"));
        Self::with_path(data_dir.join("settings.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load(&self) -> Settings {
        let _guard = self.lock.lock().await;
        let mut settings = match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => match serde_json::from_slice::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("settings document is corrupt, using defaults: {err}");
                    Settings::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Settings::default(),
            Err(err) => {
                warn!("failed to read settings document, using defaults: {err}");
                Settings::default()
            }
        };
        settings.sanitize();
        settings
    }

    pub async fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut document = settings.clone();
        document.last_updated = Some(Utc::now().to_rfc3339());

        let payload = serde_json::to_vec_pretty(&document)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}
