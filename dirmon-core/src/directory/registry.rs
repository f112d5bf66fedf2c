//! `src/directory/registry.rs`
//!
//! Process-wide map from URI to the live [`Directory`] for it. Entries are
//! weak: a directory lives exactly as long as somebody holds it, and removes
//! its own entry when dropped.

use std::sync::{Arc, Weak};

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use super::engine::Directory;
use crate::{
    backend::traits::{BackendFactory, SchemeBackendFactory},
    config::Config,
    error::{CoreError, CoreResult},
    model::uri::Uri,
};

pub(crate) struct RegistryInner {
    factory: Arc<dyn BackendFactory>,
    config: Config,
    directories: Mutex<AHashMap<Uri, Weak<Directory>>>,
}

impl RegistryInner {
    /// Drop the entry for `uri` unless it already points at a newer directory.
    pub(crate) fn forget(&self, uri: &Uri) {
        let mut directories = self.directories.lock();

        if directories
            .get(uri)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            directories.remove(uri);
        }
    }
}

#[derive(Clone)]
pub struct DirectoryRegistry {
    inner: Arc<RegistryInner>,
}

impl DirectoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::with_factory(Arc::new(SchemeBackendFactory), config)
    }

    #[must_use]
    pub fn with_factory(factory: Arc<dyn BackendFactory>, config: Config) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                factory,
                config,
                directories: Mutex::new(AHashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The directory for `uri`, created on first use. The same instance is
    /// returned for as long as any reference to it is alive.
    ///
    /// Must be called within a Tokio runtime; the directory schedules its
    /// work on it.
    pub fn get_by_uri(&self, uri: &Uri) -> CoreResult<Arc<Directory>> {
        let mut directories = self.inner.directories.lock();

        if let Some(existing) = directories.get(uri).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let runtime = Handle::try_current()
            .map_err(|_| CoreError::invalid_state("directories need a Tokio runtime"))?;
        let backend = self.inner.factory.create(uri, &self.inner.config)?;

        let directory = Directory::new(
            uri.clone(),
            backend,
            self.inner.config.clone(),
            runtime,
            Arc::downgrade(&self.inner),
        );
        directories.insert(uri.clone(), Arc::downgrade(&directory));

        debug!(
            marker = "DIRECTORY_REGISTRY",
            operation_type = "directory_created",
            uri = %uri,
            backend = directory.backend_name(),
            "Directory created"
        );

        Ok(directory)
    }

    /// Parse `text` and look it up.
    pub fn get(&self, text: &str) -> CoreResult<Arc<Directory>> {
        self.get_by_uri(&Uri::parse(text)?)
    }

    /// Number of directories currently alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner
            .directories
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl Default for DirectoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceCell<DirectoryRegistry> = OnceCell::new();

/// Install the process-wide registry. Fails when one is already in use.
pub fn install_global(registry: DirectoryRegistry) -> CoreResult<()> {
    GLOBAL
        .set(registry)
        .map_err(|_| CoreError::invalid_state("global directory registry already installed"))
}

/// The process-wide registry, created with defaults on first use.
pub fn global() -> &'static DirectoryRegistry {
    GLOBAL.get_or_init(DirectoryRegistry::new)
}

/// Shorthand for `global().get_by_uri(uri)`.
pub fn get_by_uri(uri: &Uri) -> CoreResult<Arc<Directory>> {
    global().get_by_uri(uri)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn same_uri_same_instance_while_alive() {
        let temp_dir = TempDir::new().unwrap();
        let registry = DirectoryRegistry::new();
        let uri = Uri::from_path(temp_dir.path()).unwrap();

        let a = registry.get_by_uri(&uri).unwrap();
        let b = registry
            .get(&format!("{}/", uri.as_str().trim_end_matches('/')))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.live_count(), 1);

        drop(a);
        drop(b);
        assert_eq!(registry.live_count(), 0);
        assert!(registry.inner.directories.lock().is_empty());
    }

    #[tokio::test]
    async fn scheme_picks_the_backend() {
        let registry = DirectoryRegistry::new();

        let search = registry.get_by_uri(&Uri::search(7)).unwrap();
        assert_eq!(search.backend_name(), "search");

        let temp_dir = TempDir::new().unwrap();
        let vfs = registry
            .get_by_uri(&Uri::from_path(temp_dir.path()).unwrap())
            .unwrap();
        assert_eq!(vfs.backend_name(), "vfs");
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let registry = DirectoryRegistry::new();

        assert!(matches!(
            registry.get("ftp://example.org/pub"),
            Err(CoreError::UnsupportedScheme(_))
        ));
    }

    // The only test in this binary touching the global registry
    #[tokio::test]
    async fn global_registry_installs_once() {
        let mut config = Config::default();
        config.search.batch_size = 3;

        install_global(DirectoryRegistry::with_config(config)).unwrap();
        assert!(matches!(
            install_global(DirectoryRegistry::new()),
            Err(CoreError::InvalidState { .. })
        ));
        assert_eq!(global().config().search.batch_size, 3);

        let a = get_by_uri(&Uri::search(99)).unwrap();
        let b = global().get_by_uri(&Uri::search(99)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn needs_a_runtime() {
        let registry = DirectoryRegistry::new();
        let uri = Uri::from_path(std::path::Path::new("/")).unwrap();

        assert!(matches!(
            registry.get_by_uri(&uri),
            Err(CoreError::InvalidState { .. })
        ));
    }
}
