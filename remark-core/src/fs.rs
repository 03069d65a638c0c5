//! Filesystem capability shared by the builder and the dev server.
//!
//! Everything that touches files goes through [`Vfs`], so the same code can
//! run against the real disk ([`NativeFs`]) or the in-memory mirror
//! ([`MemFs`](crate::memfs::MemFs)) the dev server serves from.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

/// Read/write/copy surface over a tree of files.
pub trait Vfs: Send + Sync {
    /// Names of the entries directly inside `dir`, in listing order.
    fn list(&self, dir: &Path) -> impl Future<Output = io::Result<Vec<String>>> + Send;

    fn read(&self, path: &Path) -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Write a file, creating missing parent directories.
    fn write(&self, path: &Path, contents: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    fn create_dir_all(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// Remove a directory tree. A missing directory is not an error.
    fn remove_dir_all(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    fn is_dir(&self, path: &Path) -> impl Future<Output = io::Result<bool>> + Send;

    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    /// Read `dir/file` as text. Invalid UTF-8 is replaced, never an error.
    fn get_content(
        &self,
        dir: &Path,
        file: &str,
    ) -> impl Future<Output = io::Result<String>> + Send {
        let path = dir.join(file);
        async move {
            let bytes = self.read(&path).await?;
            Ok(String::from_utf8(bytes)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
        }
    }
}

/// The real filesystem, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl Vfs for NativeFs {
    async fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        // read_dir order is platform dependent
        names.sort();
        Ok(names)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(tokio::fs::metadata(path).await?.is_dir())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

/// Copy the tree under `source` in `source_fs` to `destination` in
/// `destination_fs`, depth first. Destination directories are created before
/// anything is written into them.
pub async fn copy_dir<S: Vfs, D: Vfs>(
    source_fs: &S,
    source: &Path,
    destination_fs: &D,
    destination: &Path,
) -> io::Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(source.to_path_buf(), destination.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        destination_fs.create_dir_all(&to).await?;

        for name in source_fs.list(&from).await? {
            let source_file = from.join(&name);
            let destination_file = to.join(&name);

            if source_fs.is_dir(&source_file).await? {
                pending.push((source_file, destination_file));
            } else {
                let contents = source_fs.read(&source_file).await?;
                destination_fs.write(&destination_file, &contents).await?;
            }
        }
    }

    Ok(())
}
