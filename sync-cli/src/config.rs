//! Configuration resolution for offline-sync.

use anyhow::{Context, Result};
use offline_sync_client::ClientConfig;
use std::path::Path;

/// Name of the configuration file looked up in the data directory.
pub const CONFIG_FILE: &str = "client.toml";

/// Resolve the client configuration.
///
/// An explicit `--config` must exist. Otherwise `client.toml` in the data
/// directory is used if present, and defaults if not. A relative database
/// path is placed inside the data directory.
pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<ClientConfig> {
    let mut config = match explicit {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let path = data_dir.join(CONFIG_FILE);
            if path.exists() {
                ClientConfig::from_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?
            } else {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                ClientConfig::default()
            }
        }
    };

    if config.store.database.is_relative() {
        config.store.database = data_dir.join(&config.store.database);
    }

    // Fail early rather than on the first replay.
    config.base_url().context("Invalid replay.base_url")?;

    Ok(config)
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_place_database_in_data_dir() {
        let dir = tempdir().unwrap();

        let config = load(dir.path(), None).unwrap();
        assert_eq!(
            config.store.database,
            dir.path().join("offline-queue.db")
        );
        assert_eq!(config.replay.base_url, "http://127.0.0.1:5000/");
    }

    #[test]
    fn data_dir_config_file_is_used() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[replay]\nbase_url = \"http://backend.test/\"\n",
        )
        .unwrap();

        let config = load(dir.path(), None).unwrap();
        assert_eq!(config.replay.base_url, "http://backend.test/");
    }

    #[test]
    fn absolute_database_path_is_kept() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("elsewhere").join("queue.db");
        let file = dir.path().join("custom.toml");
        std::fs::write(
            &file,
            format!("[store]\ndatabase = {:?}\n", db.display().to_string()),
        )
        .unwrap();

        let config = load(dir.path(), Some(&file)).unwrap();
        assert_eq!(config.store.database, db);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let result = load(dir.path(), Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[replay]\nbase_url = \"not a url\"\n",
        )
        .unwrap();

        assert!(load(dir.path(), None).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("test-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }
}
