//! Filesystem primitives backing the job lifecycle.
//!
//! Layout under a store's root:
//!
//! ```text
//! root/<job id>/                              working files of the job
//! root/<job id>/program-result/               created once, by the background unit
//! root/<job id>/program-result/<artifact>     on success
//! root/<job id>/program-result/error.json     on failure
//! ```
//!
//! The result directory is created exclusively and is only ever filled by renaming a finished
//! file into it, so "exists and is non-empty" means the job reached a terminal state.

use crate::errors::{Failure, Result, StoreError};
use crate::types::{Artifact, JobId};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub const RESULT_DIR: &str = "program-result";
pub const ERROR_FILE: &str = "error.json";

#[derive(Clone, Debug)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    pub fn marker_dir(&self, job_id: JobId) -> PathBuf {
        self.job_dir(job_id).join(RESULT_DIR)
    }

    pub async fn create_job_dir(&self, job_id: JobId) -> Result<PathBuf> {
        let dir = self.job_dir(job_id);
        create_exclusive(&dir).await?;
        Ok(dir)
    }

    /// Create the result marker of a job. Fails with `Collision` if it already exists.
    pub async fn create_marker(&self, job_id: JobId) -> Result<PathBuf> {
        let marker = self.marker_dir(job_id);
        create_exclusive(&marker).await?;
        Ok(marker)
    }

    pub async fn job_exists(&self, job_id: JobId) -> Result<bool> {
        exists(&self.job_dir(job_id)).await
    }

    /// Atomically take a job directory out of the polling namespace.
    ///
    /// Returns `None` if the directory is already gone, which is what a poller racing a
    /// successful claim observes.
    pub async fn claim_job_dir(&self, job_id: JobId) -> Result<Option<PathBuf>> {
        let claimed = self.root.join(format!(".{}.claimed", job_id));
        match fs::rename(self.job_dir(job_id), &claimed).await {
            Ok(()) => Ok(Some(claimed)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_job_dir(&self, dir: &Path) -> Result<()> {
        safe_delete_tree(dir, &self.root).await
    }
}

async fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Create `path` (and any missing parents), failing if `path` itself already exists.
pub async fn create_exclusive(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    match fs::create_dir(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(StoreError::Collision(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn is_terminal(marker: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(marker).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(entries.next_entry().await?.is_some())
}

fn validate_artifact_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(c)), None) if c == name
    );
    if !single_normal || name == ERROR_FILE {
        return Err(StoreError::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

/// Write `data` next to the marker, then rename it in so it appears all at once.
async fn publish(marker: &Path, name: &str, data: &[u8]) -> Result<()> {
    let staging_dir = marker.parent().unwrap_or(marker);
    let staging = staging_dir.join(format!(".{}.partial", name));
    fs::write(&staging, data).await?;
    fs::rename(&staging, marker.join(name)).await?;
    debug!(marker = %marker.display(), name, "published job result");
    Ok(())
}

pub async fn write_artifact(marker: &Path, artifact: &Artifact) -> Result<()> {
    validate_artifact_name(&artifact.name)?;
    publish(marker, &artifact.name, &artifact.data).await
}

/// Read the single artifact stored in `marker`.
pub async fn read_artifact(marker: &Path) -> Result<Artifact> {
    let mut entries = fs::read_dir(marker).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ERROR_FILE {
            continue;
        }
        let data = fs::read(entry.path()).await?;
        return Ok(Artifact::new(name, data));
    }
    Err(StoreError::EmptyMarker(marker.to_path_buf()))
}

pub async fn write_error(marker: &Path, failure: &Failure) -> Result<()> {
    let json = serde_json::to_vec(failure)?;
    publish(marker, ERROR_FILE, &json).await
}

/// Read the error descriptor of `marker`, if the job failed.
pub async fn read_error(marker: &Path) -> Result<Option<Failure>> {
    match fs::read(marker.join(ERROR_FILE)).await {
        Ok(json) => Ok(Some(serde_json::from_slice(&json)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Recursively delete `path`, but only when `root` is a strict ancestor of it.
///
/// Both paths are canonicalized first, so `..` segments and symlinks cannot escape the root.
pub async fn safe_delete_tree(path: &Path, root: &Path) -> Result<()> {
    let outside = || StoreError::OutsideRoot {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };
    let canonical_root = fs::canonicalize(root).await?;
    let canonical_path = fs::canonicalize(path).await?;
    if canonical_path == canonical_root || !canonical_path.starts_with(&canonical_root) {
        return Err(outside());
    }
    fs::remove_dir_all(&canonical_path).await?;
    debug!(path = %canonical_path.display(), "deleted job directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn store() -> (TempDir, ResultStore) {
        let tmp = TempDir::new().expect("tempdir");
        let store = ResultStore::new(tmp.path().join("jobs"));
        (tmp, store)
    }

    #[tokio::test]
    async fn marker_creation_is_exclusive() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        store.create_marker(id).await.unwrap();
        match store.create_marker(id).await {
            Err(StoreError::Collision(path)) => assert_eq!(path, store.marker_dir(id)),
            other => panic!("expected collision, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn job_dir_creation_is_exclusive() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        assert!(matches!(
            store.create_job_dir(id).await,
            Err(StoreError::Collision(_))
        ));
    }

    #[tokio::test]
    async fn terminal_only_once_marker_has_an_entry() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        let marker = store.marker_dir(id);
        assert!(!is_terminal(&marker).await.unwrap());
        store.create_job_dir(id).await.unwrap();
        store.create_marker(id).await.unwrap();
        assert!(!is_terminal(&marker).await.unwrap());
        write_artifact(&marker, &Artifact::new("out.txt", &b"hello"[..]))
            .await
            .unwrap();
        assert!(is_terminal(&marker).await.unwrap());
    }

    #[tokio::test]
    async fn artifact_is_read_back_unmodified() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        let marker = store.create_marker(id).await.unwrap();
        let artifact = Artifact::new("results.zip", vec![0u8, 159, 146, 150]);
        write_artifact(&marker, &artifact).await.unwrap();

        assert_eq!(read_artifact(&marker).await.unwrap(), artifact);
        assert_eq!(read_error(&marker).await.unwrap(), None);
        // nothing staged is left behind in the result directory
        let mut entries = fs::read_dir(&marker).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn error_descriptor_round_trip_on_disk() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        let marker = store.create_marker(id).await.unwrap();
        write_error(&marker, &Failure::new("bad input", 400))
            .await
            .unwrap();

        let raw = fs::read_to_string(marker.join(ERROR_FILE)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["message"], "bad input");
        assert_eq!(value["code"], 400);
        assert_eq!(
            read_error(&marker).await.unwrap(),
            Some(Failure::new("bad input", 400))
        );
    }

    #[tokio::test]
    async fn empty_marker_has_no_artifact() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        let marker = store.create_marker(id).await.unwrap();
        assert!(matches!(
            read_artifact(&marker).await,
            Err(StoreError::EmptyMarker(_))
        ));
    }

    #[tokio::test]
    async fn artifact_names_must_be_plain_file_names() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        let marker = store.create_marker(id).await.unwrap();
        for name in ["", "../escape.txt", "a/b.txt", "/etc/passwd", ".", "..", ERROR_FILE] {
            let result = write_artifact(&marker, &Artifact::new(name, &b"x"[..])).await;
            assert!(
                matches!(result, Err(StoreError::InvalidArtifactName(_))),
                "{:?} accepted",
                name
            );
        }
        assert!(!is_terminal(&marker).await.unwrap());
    }

    #[tokio::test]
    async fn safe_delete_refuses_paths_outside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("sandbox");
        let outside = tmp.path().join("precious");
        fs::create_dir_all(&root).await.unwrap();
        fs::create_dir_all(&outside).await.unwrap();
        fs::write(outside.join("keep.txt"), b"keep").await.unwrap();

        let result = safe_delete_tree(&outside, &root).await;
        assert!(matches!(result, Err(StoreError::OutsideRoot { .. })));
        assert!(outside.join("keep.txt").exists());

        // dot-dot segments are resolved before the ancestry check
        let sneaky = root.join("..").join("precious");
        let result = safe_delete_tree(&sneaky, &root).await;
        assert!(matches!(result, Err(StoreError::OutsideRoot { .. })));
        assert!(outside.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn safe_delete_refuses_the_root_itself() {
        let (_tmp, store) = store();
        fs::create_dir_all(store.root()).await.unwrap();
        let result = safe_delete_tree(store.root(), store.root()).await;
        assert!(matches!(result, Err(StoreError::OutsideRoot { .. })));
        assert!(store.root().exists());
    }

    #[tokio::test]
    async fn safe_delete_removes_descendants() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        let dir = store.create_job_dir(id).await.unwrap();
        fs::write(dir.join("input.ct"), b"data").await.unwrap();
        store.create_marker(id).await.unwrap();
        store.remove_job_dir(&dir).await.unwrap();
        assert!(!store.job_exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn only_one_claim_succeeds() {
        let (_tmp, store) = store();
        let id = Uuid::new_v4();
        store.create_job_dir(id).await.unwrap();
        let claimed = store.claim_job_dir(id).await.unwrap();
        assert!(claimed.is_some());
        assert!(!store.job_exists(id).await.unwrap());
        assert_eq!(store.claim_job_dir(id).await.unwrap(), None);
        store.remove_job_dir(&claimed.unwrap()).await.unwrap();
    }
}
