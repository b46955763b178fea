//! Resource packages and the registry that opens them.
//!
//! The generator never touches the filesystem directly: every named resource
//! goes through a [`Package`]. A [`PackageManager`] is constructed once at
//! startup and handed to whatever needs to open packages; it makes sure each
//! package path is loaded at most once.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{GenerateError, GenerateResult};

// ============================================================================
// Package
// ============================================================================

/// A named container of resources.
pub trait Package: Send + Sync {
    /// Human readable name, used in logs.
    fn name(&self) -> &str;

    /// Resolves `name` to the raw bytes of the resource.
    ///
    /// Fails with [`GenerateError::ResourceNotFound`] if the package has no
    /// such resource.
    fn resolve(&self, name: &str) -> GenerateResult<Vec<u8>>;
}

/// A package type that can be opened from a path by the [`PackageManager`].
pub trait Packaged: Package + Any + Sized {
    fn open(path: &Path) -> GenerateResult<Self>;
}

/// Normalizes a package-relative resource name.
///
/// Backslashes become slashes, empty and `.` components are dropped. Absolute
/// names and `..` components are rejected.
pub fn normalize_name(name: &str) -> Option<String> {
    let s = name.replace('\\', "/");
    if s.starts_with('/') {
        return None;
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return None;
        }
        out.push(part);
    }

    if out.is_empty() {
        return None;
    }
    Some(out.join("/"))
}

// ============================================================================
// DirPackage
// ============================================================================

/// A package backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirPackage {
    root: PathBuf,
    name: String,
}

impl DirPackage {
    /// Returns the directory this package reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Package for DirPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, name: &str) -> GenerateResult<Vec<u8>> {
        let rel = normalize_name(name).ok_or_else(|| GenerateError::not_found(name))?;
        let path = self.root.join(&rel);
        match std::fs::read(&path) {
            Ok(bytes) => {
                tracing::trace!(package = %self.name, resource = %rel, len = bytes.len(), "resolved");
                Ok(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(GenerateError::not_found(name)),
            Err(source) => Err(GenerateError::PackageOpen { path, source }),
        }
    }
}

impl Packaged for DirPackage {
    fn open(path: &Path) -> GenerateResult<Self> {
        let meta = std::fs::metadata(path).map_err(|source| GenerateError::PackageOpen {
            path: path.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(GenerateError::PackageOpen {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            root: path.to_path_buf(),
            name,
        })
    }
}

// ============================================================================
// MemoryPackage
// ============================================================================

/// A package holding its resources in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPackage {
    name: String,
    files: HashMap<String, Vec<u8>>,
}

impl MemoryPackage {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: HashMap::new(),
        }
    }

    /// Adds or replaces a resource.
    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        let key = normalize_name(name).unwrap_or_else(|| name.to_string());
        self.files.insert(key, bytes.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_file(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Removes a resource, returning its bytes.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let key = normalize_name(name).unwrap_or_else(|| name.to_string());
        self.files.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Package for MemoryPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, name: &str) -> GenerateResult<Vec<u8>> {
        let key = normalize_name(name).ok_or_else(|| GenerateError::not_found(name))?;
        self.files
            .get(&key)
            .cloned()
            .ok_or_else(|| GenerateError::not_found(name))
    }
}

// ============================================================================
// PackageManager
// ============================================================================

type LoadedPackage = Arc<dyn Any + Send + Sync>;

/// Registry of opened packages, keyed by normalized path.
///
/// Each path is opened at most once; later requests for the same path and
/// type share the loaded instance. Asking for a loaded path under another type
/// re-opens it and replaces the entry. The lock is held while a package is
/// opened, so concurrent requests for the same path never open it twice.
pub struct PackageManager {
    data_dir: PathBuf,
    loaded: Mutex<HashMap<PathBuf, LoadedPackage>>,
}

impl PackageManager {
    /// Creates a registry that resolves package names under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Opens the package with the given name (including extension).
    pub fn open<T: Packaged + Send + Sync>(&self, name: &str) -> GenerateResult<Arc<T>> {
        let path = self.package_path(name)?;
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = loaded.get(&path) {
            match Arc::clone(existing).downcast::<T>() {
                Ok(typed) => {
                    tracing::trace!(path = %path.display(), "package already loaded");
                    return Ok(typed);
                }
                Err(_) => {
                    tracing::warn!(path = %path.display(), "package loaded with another type, reopening");
                }
            }
        }

        let package = Arc::new(T::open(&path)?);
        tracing::debug!(path = %path.display(), package = package.name(), "opened package");
        loaded.insert(path, Arc::clone(&package) as LoadedPackage);
        Ok(package)
    }

    /// Opens a directory package with the given name.
    pub fn open_any(&self, name: &str) -> GenerateResult<Arc<DirPackage>> {
        self.open::<DirPackage>(name)
    }

    /// Returns true if a package with this name has been opened.
    pub fn is_loaded(&self, name: &str) -> bool {
        let Ok(path) = self.package_path(name) else {
            return false;
        };
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&path)
    }

    /// Number of loaded packages.
    pub fn len(&self) -> usize {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every loaded package.
    pub fn clear(&self) {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn package_path(&self, name: &str) -> GenerateResult<PathBuf> {
        let rel = normalize_name(name).ok_or_else(|| GenerateError::not_found(name))?;
        Ok(self.data_dir.join(rel))
    }
}

impl fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageManager")
            .field("data_dir", &self.data_dir)
            .field("loaded", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_cleans_components() {
        assert_eq!(normalize_name("a/./b.png").as_deref(), Some("a/b.png"));
        assert_eq!(normalize_name("a\\b.png").as_deref(), Some("a/b.png"));
        assert_eq!(normalize_name("a//b.png").as_deref(), Some("a/b.png"));
        assert_eq!(normalize_name("/etc/passwd"), None);
        assert_eq!(normalize_name("../secret.png"), None);
        assert_eq!(normalize_name(""), None);
        assert_eq!(normalize_name("./"), None);
    }

    #[test]
    fn memory_package_resolves_inserted_files() {
        let mut pkg = MemoryPackage::new();
        assert!(matches!(
            pkg.resolve("foo.png"),
            Err(GenerateError::ResourceNotFound { .. })
        ));

        pkg.insert("./foo.png", vec![1, 2, 3]);
        assert_eq!(pkg.resolve("foo.png").unwrap(), vec![1, 2, 3]);
        assert_eq!(pkg.len(), 1);

        assert_eq!(pkg.remove("foo.png"), Some(vec![1, 2, 3]));
        assert!(pkg.is_empty());
    }

    #[test]
    fn dir_package_reads_files_and_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("frames")).unwrap();
        std::fs::write(dir.path().join("frames/red.png"), b"not really a png").unwrap();

        let pkg = DirPackage::open(dir.path()).unwrap();
        assert_eq!(pkg.resolve("frames/red.png").unwrap(), b"not really a png");
        assert!(matches!(
            pkg.resolve("frames/blue.png"),
            Err(GenerateError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            pkg.resolve("../outside.png"),
            Err(GenerateError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn dir_package_open_fails_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirPackage::open(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, GenerateError::PackageOpen { .. }));
    }

    #[test]
    fn manager_opens_each_path_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("magic.mse-style")).unwrap();

        let manager = PackageManager::new(dir.path());
        assert!(!manager.is_loaded("magic.mse-style"));

        let first = manager.open_any("magic.mse-style").unwrap();
        let second = manager.open_any("./magic.mse-style").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(manager.is_loaded("magic.mse-style"));
        assert_eq!(manager.len(), 1);
    }

    #[derive(Debug)]
    struct Stylesheet {
        path: PathBuf,
    }

    impl Package for Stylesheet {
        fn name(&self) -> &str {
            "stylesheet"
        }

        fn resolve(&self, name: &str) -> GenerateResult<Vec<u8>> {
            Err(GenerateError::not_found(name))
        }
    }

    impl Packaged for Stylesheet {
        fn open(path: &Path) -> GenerateResult<Self> {
            Ok(Self {
                path: path.to_path_buf(),
            })
        }
    }

    #[test]
    fn manager_replaces_entry_opened_with_other_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("style")).unwrap();
        let manager = PackageManager::new(dir.path());

        let dir_pkg = manager.open_any("style").unwrap();
        let sheet = manager.open::<Stylesheet>("style").unwrap();
        assert_eq!(sheet.path, dir.path().join("style"));
        assert_eq!(manager.len(), 1);

        // The directory package was replaced, so this opens a fresh one.
        let reopened = manager.open_any("style").unwrap();
        assert!(!Arc::ptr_eq(&dir_pkg, &reopened));
    }

    #[test]
    fn manager_reports_open_failures() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackageManager::new(dir.path());
        assert!(matches!(
            manager.open_any("nothing-here"),
            Err(GenerateError::PackageOpen { .. })
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn manager_is_shareable_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shared")).unwrap();
        let manager = PackageManager::new(dir.path());

        let opened: Vec<Arc<DirPackage>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| manager.open_any("shared").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for pkg in &opened[1..] {
            assert!(Arc::ptr_eq(&opened[0], pkg));
        }
    }
}
