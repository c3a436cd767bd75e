use std::{
    ffi::OsString,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

/// A per-process scratch directory, removed along with everything inside it on drop
#[derive(Debug)]
pub(crate) struct TmpDir {
    path: Option<PathBuf>,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path: Some(path) }))
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    fn build_tmp_file(&self, ext: Option<&str>) -> PathBuf {
        if let Some(ext) = ext {
            self.path().join(format!("{}{}", Uuid::now_v7(), ext))
        } else {
            self.path().join(Uuid::now_v7().to_string())
        }
    }

    pub(crate) fn tmp_file(&self, ext: Option<&str>) -> TmpFile {
        TmpFile::new(self.build_tmp_file(ext))
    }

    pub(crate) async fn cleanup(self: Arc<Self>) -> std::io::Result<()> {
        if let Some(path) = Arc::into_inner(self).and_then(|mut this| this.path.take()) {
            tokio::fs::remove_dir_all(path).await?;
        }

        Ok(())
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_dir_all(path);
        }
    }
}

/// An exclusively-owned temporary file path
///
/// The file (if it was ever created) is removed when the handle is dropped, so every exit path
/// out of a pipeline releases it
#[must_use]
#[derive(Debug)]
pub(crate) struct TmpFile {
    path: PathBuf,
    armed: bool,
}

impl TmpFile {
    fn new(path: PathBuf) -> Self {
        TmpFile { path, armed: true }
    }

    /// A new temporary file next to this one, named by appending `suffix` to this file's name
    pub(crate) fn sibling(&self, suffix: &str) -> TmpFile {
        let mut path = OsString::from(self.path.as_os_str());
        path.push(suffix);

        TmpFile::new(PathBuf::from(path))
    }

    pub(crate) async fn cleanup(mut self) -> std::io::Result<()> {
        self.armed = false;

        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl AsRef<Path> for TmpFile {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Deref for TmpFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.path
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TmpDir;

    #[actix_web::test]
    async fn tmp_file_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let tmp_dir = TmpDir::init(root.path()).await.unwrap();

        let file = tmp_dir.tmp_file(Some(".mp4"));
        tokio::fs::write(&*file, b"bytes").await.unwrap();
        let path = file.to_path_buf();
        assert!(path.exists());

        drop(file);

        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn sibling_appends_suffix() {
        let root = tempfile::tempdir().unwrap();
        let tmp_dir = TmpDir::init(root.path()).await.unwrap();

        let file = tmp_dir.tmp_file(Some(".mp4"));
        let sibling = file.sibling(".processing");

        assert_eq!(sibling.parent(), file.parent());

        let name = sibling.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".mp4.processing"));
    }

    #[actix_web::test]
    async fn cleanup_tolerates_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let tmp_dir = TmpDir::init(root.path()).await.unwrap();

        let file = tmp_dir.tmp_file(None);

        file.cleanup().await.unwrap();
    }

    #[actix_web::test]
    async fn dir_removed_on_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let tmp_dir = TmpDir::init(root.path()).await.unwrap();
        let path = tmp_dir.path().to_path_buf();

        let file = tmp_dir.tmp_file(None);
        tokio::fs::write(&*file, b"bytes").await.unwrap();
        drop(file);

        tmp_dir.cleanup().await.unwrap();

        assert!(!path.exists());
    }
}
