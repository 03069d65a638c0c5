//! In-memory file tree used as the dev server's serving root.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::fs::Vfs;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Arc<[u8]>),
}

/// A cheaply clonable, shared tree of path -> bytes.
///
/// Paths are normalised lexically (`./docs/a` and `docs/a` are the same
/// entry). Reads and writes take a short lock and never hold it across an
/// await, so concurrent readers see either the old or the new content.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    nodes: Arc<RwLock<BTreeMap<PathBuf, Node>>>,
}

/// Drop `.` components and resolve `..` without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path.parent().is_none()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of the file at `path`, if there is one.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = normalize(path.as_ref());
        match self.nodes.read().get(&path) {
            Some(Node::File(contents)) => Some(contents.to_vec()),
            _ => None,
        }
    }

    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize(path.as_ref());
        matches!(self.nodes.read().get(&path), Some(Node::File(_)))
    }

    /// Number of files (directories excluded).
    pub fn file_count(&self) -> usize {
        self.nodes
            .read()
            .values()
            .filter(|node| matches!(node, Node::File(_)))
            .count()
    }

    fn mkdir_p(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if is_root(ancestor) {
                continue;
            }
            match nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} exists and is a file", ancestor.display()),
                    ));
                }
                None => {
                    nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
        let path = normalize(path.as_ref());
        let mut nodes = self.nodes.write();

        if let Some(parent) = path.parent() {
            Self::mkdir_p(&mut nodes, parent)?;
        }
        if let Some(Node::Dir) = nodes.get(&path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }
        nodes.insert(path, Node::File(Arc::from(contents)));
        Ok(())
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        let path = normalize(path.as_ref());
        match self.nodes.read().get(&path) {
            Some(Node::File(contents)) => Ok(contents.to_vec()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(&path)),
        }
    }

    pub fn read_dir(&self, dir: impl AsRef<Path>) -> io::Result<Vec<String>> {
        let dir = normalize(dir.as_ref());
        let nodes = self.nodes.read();

        if !is_root(&dir) && !matches!(nodes.get(&dir), Some(Node::Dir)) {
            return Err(not_found(&dir));
        }

        // BTreeMap keeps siblings in name order
        Ok(nodes
            .keys()
            .filter(|key| key.parent() == Some(dir.as_path()) && !is_root(key))
            .filter_map(|key| key.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect())
    }

    /// Remove `path` and everything below it. Missing paths are ignored.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        self.nodes.write().retain(|key, _| !key.starts_with(&path));
    }

    pub fn mkdir(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = normalize(path.as_ref());
        Self::mkdir_p(&mut self.nodes.write(), &path)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize(path.as_ref());
        is_root(&path) || self.nodes.read().contains_key(&path)
    }

    pub fn is_directory(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize(path.as_ref());
        is_root(&path) || matches!(self.nodes.read().get(&path), Some(Node::Dir))
    }
}

impl Vfs for MemFs {
    async fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        self.read_dir(dir)
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.read_file(path)
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.write_file(path, contents)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.mkdir(path)
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.remove(path);
        Ok(())
    }

    async fn is_dir(&self, path: &Path) -> io::Result<bool> {
        if !self.contains(path) {
            return Err(not_found(path));
        }
        Ok(self.is_directory(path))
    }

    async fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("./docs/index.html")), PathBuf::from("docs/index.html"));
        assert_eq!(normalize(Path::new("docs/../src/a.md")), PathBuf::from("src/a.md"));
        assert_eq!(normalize(Path::new("/tmp/./x")), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn test_write_then_read_through_equivalent_paths() {
        let fs = MemFs::new();
        fs.write_file("./docs/index.html", b"hello").unwrap();

        assert_eq!(fs.get("docs/index.html").unwrap(), b"hello");
        assert!(fs.is_directory("docs"));
        assert!(fs.is_file("./docs/index.html"));
    }

    #[test]
    fn test_read_dir_lists_direct_children_in_order() {
        let fs = MemFs::new();
        fs.write_file("src/c.md", b"C").unwrap();
        fs.write_file("src/a.md", b"A").unwrap();
        fs.write_file("src/nested/b.md", b"B").unwrap();

        assert_eq!(fs.read_dir("src").unwrap(), vec!["a.md", "c.md", "nested"]);
        assert_eq!(fs.read_dir("").unwrap(), vec!["src"]);
    }

    #[test]
    fn test_read_dir_missing_is_not_found() {
        let fs = MemFs::new();
        let err = fs.read_dir("missing").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_subtree() {
        let fs = MemFs::new();
        fs.write_file("docs/index.html", b"x").unwrap();
        fs.write_file("docs/css/a.css", b"y").unwrap();
        fs.write_file("docsify/keep.txt", b"z").unwrap();

        fs.remove("docs");

        assert!(!fs.contains("docs"));
        assert!(!fs.contains("docs/css/a.css"));
        assert!(fs.is_file("docsify/keep.txt"));

        // removing again is fine
        fs.remove("docs");
    }

    #[test]
    fn test_file_in_place_of_directory_is_rejected() {
        let fs = MemFs::new();
        fs.write_file("docs", b"not a dir").unwrap();
        assert!(fs.write_file("docs/index.html", b"x").is_err());
        assert!(fs.mkdir("docs/css").is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let fs = MemFs::new();
        let other = fs.clone();
        other.write_file("a.txt", b"1").unwrap();
        assert_eq!(fs.get("a.txt").unwrap(), b"1");
        assert_eq!(fs.file_count(), 1);
    }

    #[tokio::test]
    async fn test_vfs_is_dir_missing_errors() {
        let fs = MemFs::new();
        assert!(fs.is_dir(Path::new("nope")).await.is_err());
        fs.mkdir("yes").unwrap();
        assert!(fs.is_dir(Path::new("yes")).await.unwrap());
    }
}
