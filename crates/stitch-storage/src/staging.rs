//! Staging store: stage, reserve, publish, discard.
//!
//! Every file gets a name containing a fresh random token, so no two
//! operations ever touch the same path and no file locking is needed. The
//! in-memory registry is the authority on whether a name is staged; names
//! leave it once published or discarded, and after a restart the `.tmp`
//! marker on disk stands in for it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stitch_models::{next_id, ResourceRole, ResourceState, TempResource, STAGED_SUFFIX};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::{move_file, remove_if_exists};
use crate::guard::{sanitize_original_name, validate_name};

/// Staging store configuration.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Directory holding staged and published files
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("storage/staging"),
        }
    }
}

impl StagingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            dir: std::env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().dir),
        }
    }
}

/// Scoped temporary file store.
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
    registry: Arc<RwLock<HashMap<String, ResourceState>>>,
}

impl StagingStore {
    /// Open the store, creating its directory if needed.
    pub async fn open(config: StagingConfig) -> StorageResult<Self> {
        fs::create_dir_all(&config.dir).await.map_err(|e| {
            StorageError::config_error(format!(
                "cannot create staging dir {}: {}",
                config.dir.display(),
                e
            ))
        })?;

        info!(dir = %config.dir.display(), "Staging store ready");

        Ok(Self {
            dir: config.dir,
            registry: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a client stream under a fresh name.
    ///
    /// Bytes land in a staged file first and are renamed into place only after
    /// the whole stream has been written, so a partial upload is never visible.
    /// `original_name` is cosmetic; only its sanitized last component is kept.
    pub async fn stage<R>(
        &self,
        role: ResourceRole,
        original_name: &str,
        mut content: R,
    ) -> StorageResult<TempResource>
    where
        R: AsyncRead + Unpin + Send,
    {
        let name = format!(
            "{}_{}_{}",
            role,
            next_id(),
            sanitize_original_name(original_name)
        );
        let staged_name = format!("{name}{STAGED_SUFFIX}");
        let staged_path = self.dir.join(&staged_name);

        self.set_state(&staged_name, ResourceState::Staged).await;

        let written = async {
            let mut file = fs::File::create(&staged_path).await?;
            let n = tokio::io::copy(&mut content, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        let bytes = match written {
            Ok(n) => n,
            Err(e) => {
                warn!(name = %staged_name, error = %e, "Staging write failed, removing partial file");
                let _ = remove_if_exists(&staged_path).await;
                self.set_state(&staged_name, ResourceState::Deleted).await;
                return Err(e.into());
            }
        };

        let resource = TempResource {
            name: staged_name,
            role,
            state: ResourceState::Staged,
            path: staged_path,
        };
        let path = self.publish(&resource).await?;

        debug!(name = %name, bytes, "Staged input");

        Ok(TempResource {
            name,
            role,
            state: ResourceState::Published,
            path,
        })
    }

    /// Allocate a staged output name; no file is created.
    pub async fn reserve_output(
        &self,
        role: ResourceRole,
        extension: &str,
    ) -> StorageResult<TempResource> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty()
            || !extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(StorageError::invalid_name(format!(
                "invalid extension: {extension}"
            )));
        }

        let name = format!("{}_{}.{}{}", role, next_id(), extension, STAGED_SUFFIX);
        self.set_state(&name, ResourceState::Staged).await;

        Ok(TempResource {
            path: self.dir.join(&name),
            name,
            role,
            state: ResourceState::Staged,
        })
    }

    /// Atomically make a staged resource visible under its public name.
    pub async fn publish(&self, staged: &TempResource) -> StorageResult<PathBuf> {
        match self.registry.read().await.get(&staged.name) {
            Some(ResourceState::Staged) => {}
            Some(state) => {
                return Err(StorageError::publish_failed(
                    &staged.name,
                    format!("resource is {state:?}, not staged"),
                ))
            }
            None => {
                return Err(StorageError::publish_failed(
                    &staged.name,
                    "resource is not registered",
                ))
            }
        }

        let public_name = staged.public_name().to_string();
        if public_name == staged.name {
            return Err(StorageError::publish_failed(
                &staged.name,
                "name has no staged marker",
            ));
        }

        if fs::metadata(&staged.path).await.is_err() {
            return Err(StorageError::publish_failed(
                &staged.name,
                "staged file is missing",
            ));
        }

        let final_path = self.dir.join(&public_name);
        move_file(&staged.path, &final_path)
            .await
            .map_err(|e| StorageError::publish_failed(&staged.name, e.to_string()))?;

        self.registry.write().await.remove(&staged.name);

        Ok(final_path)
    }

    /// Best-effort delete. A missing file is not an error.
    pub async fn discard(&self, path: &Path) {
        match remove_if_exists(path).await {
            Ok(true) => debug!(path = %path.display(), "Discarded file"),
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard file"),
        }

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            self.set_state(name, ResourceState::Deleted).await;
        }
    }

    /// Map a caller-supplied name to a path inside the store.
    pub fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(self.dir.join(validate_name(name)?))
    }

    /// Resolve a name that must refer to an existing, published file.
    pub async fn resolve_existing(&self, name: &str) -> StorageResult<PathBuf> {
        let path = self.resolve(name)?;
        if self.is_staged(name).await {
            return Err(StorageError::invalid_name("staged files cannot be referenced"));
        }
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(StorageError::not_found(name)),
        }
    }

    /// Whether `name` is still staged.
    ///
    /// The registry decides for names this process created; otherwise the
    /// on-disk marker does.
    pub async fn is_staged(&self, name: &str) -> bool {
        match self.registry.read().await.get(name) {
            Some(state) => *state == ResourceState::Staged,
            None => stitch_models::is_staged_name(name),
        }
    }

    /// Registered state of `name`. Only staged names are tracked.
    pub async fn state_of(&self, name: &str) -> Option<ResourceState> {
        self.registry.read().await.get(name).copied()
    }

    /// Check the directory accepts writes.
    pub async fn is_writable(&self) -> bool {
        let probe = self.dir.join(format!(".probe_{}", next_id()));
        let ok = fs::write(&probe, b"ok").await.is_ok();
        let _ = remove_if_exists(&probe).await;
        ok
    }

    async fn set_state(&self, name: &str, state: ResourceState) {
        let mut registry = self.registry.write().await;
        if state == ResourceState::Deleted {
            // Deleted names are never reused; keep the map from growing
            registry.remove(name);
        } else {
            registry.insert(name.to_string(), state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, StagingStore) {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::open(StagingConfig {
            dir: dir.path().join("staging"),
        })
        .await
        .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_stage_writes_under_unique_name() {
        let (_dir, store) = store().await;

        let a = store
            .stage(ResourceRole::Audio, "../My Song.mp3", &b"abc"[..])
            .await
            .unwrap();
        let b = store
            .stage(ResourceRole::Audio, "../My Song.mp3", &b"xyz"[..])
            .await
            .unwrap();

        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("audio_"));
        assert!(a.name.ends_with("_MySong.mp3"));
        assert_eq!(a.state, ResourceState::Published);
        assert_eq!(fs::read(&a.path).await.unwrap(), b"abc");
        assert_eq!(fs::read(&b.path).await.unwrap(), b"xyz");
        assert!(!store.is_staged(&a.name).await);
    }

    #[tokio::test]
    async fn test_failed_stage_leaves_nothing_behind() {
        let (_dir, store) = store().await;
        let reader = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(std::io::Error::other("connection reset"))
            .build();

        let result = store.stage(ResourceRole::Video, "clip.mp4", reader).await;
        assert!(matches!(result, Err(StorageError::Io(_))));

        let leftovers = std::fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_reserve_then_publish() {
        let (_dir, store) = store().await;
        let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();

        assert!(out.name.starts_with("merged_"));
        assert!(out.name.ends_with(".mp4.tmp"));
        assert!(store.is_staged(&out.name).await);
        assert!(!out.path.exists());

        fs::write(&out.path, b"video").await.unwrap();
        let published = store.publish(&out).await.unwrap();

        assert_eq!(published, store.dir().join(out.public_name()));
        assert!(published.exists());
        assert!(!out.path.exists());
        assert_eq!(store.state_of(&out.name).await, None);
        assert_eq!(store.state_of(out.public_name()).await, None);
        assert!(!store.is_staged(out.public_name()).await);
    }

    #[tokio::test]
    async fn test_publish_missing_file_fails() {
        let (_dir, store) = store().await;
        let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();

        let err = store.publish(&out).await.unwrap_err();
        assert!(matches!(err, StorageError::PublishFailed { .. }));
    }

    #[tokio::test]
    async fn test_publish_twice_fails() {
        let (_dir, store) = store().await;
        let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();
        fs::write(&out.path, b"video").await.unwrap();

        store.publish(&out).await.unwrap();
        assert!(store.publish(&out).await.is_err());
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let (_dir, store) = store().await;
        let staged = store
            .stage(ResourceRole::Upload, "a.bin", &b"1"[..])
            .await
            .unwrap();

        store.discard(&staged.path).await;
        assert!(!staged.path.exists());
        store.discard(&staged.path).await;
    }

    #[tokio::test]
    async fn test_resolve_existing() {
        let (_dir, store) = store().await;
        let staged = store
            .stage(ResourceRole::Audio, "a.mp3", &b"1"[..])
            .await
            .unwrap();

        assert_eq!(store.resolve_existing(&staged.name).await.unwrap(), staged.path);
        assert!(matches!(
            store.resolve_existing("audio_missing.mp3").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.resolve_existing("../a.mp3").await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_marker_stands_in_for_unknown_names() {
        let (_dir, store) = store().await;
        assert!(store.is_staged("merged_left_over.mp4.tmp").await);
        assert!(!store.is_staged("merged_left_over.mp4").await);
    }

    #[tokio::test]
    async fn test_registry_only_holds_staged_names() {
        let (_dir, store) = store().await;

        let mut kept = Vec::new();
        for _ in 0..5 {
            let out = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();
            fs::write(&out.path, b"video").await.unwrap();
            store.publish(&out).await.unwrap();
            let input = store
                .stage(ResourceRole::Audio, "a.mp3", &b"1"[..])
                .await
                .unwrap();
            kept.push(input);
        }
        let pending = store.reserve_output(ResourceRole::Merged, "mp4").await.unwrap();

        assert_eq!(store.registry.read().await.len(), 1);
        assert!(store.is_staged(&pending.name).await);
        for input in &kept {
            assert!(store.resolve_existing(&input.name).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_input_named_like_marker_survives_restart() {
        let dir = TempDir::new().unwrap();
        let config = StagingConfig {
            dir: dir.path().join("staging"),
        };
        let staged = {
            let store = StagingStore::open(config.clone()).await.unwrap();
            store
                .stage(ResourceRole::Video, "clip.tmp", &b"frames"[..])
                .await
                .unwrap()
        };
        assert!(!staged.name.ends_with(STAGED_SUFFIX));

        let reopened = StagingStore::open(config).await.unwrap();
        assert_eq!(
            reopened.resolve_existing(&staged.name).await.unwrap(),
            staged.path
        );
    }
}
