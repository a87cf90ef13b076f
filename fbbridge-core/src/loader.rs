//! Locating and loading the native client library.
//!
//! A [`LibraryLoader`] owns an ordered list of candidate library names for
//! its [`LibraryKind`] and loads the first one that opens. Loading happens
//! at most once per loader: the fast path takes the read lock, the first
//! caller to find nothing loaded takes the write lock, checks again and
//! loads.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use strum::Display;

use crate::error::{LoadAttempt, LoadError};

/// Which build of the native library to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LibraryKind {
    /// Client library talking to a server process.
    Client,
    /// Library running the engine in-process.
    Embedded,
}

#[cfg(windows)]
const CLIENT_BASE_NAMES: &[&str] = &["fbclient", "gds32"];
#[cfg(not(windows))]
const CLIENT_BASE_NAMES: &[&str] = &["fbclient"];

#[cfg(any(windows, target_os = "macos"))]
const CLIENT_VERSIONED_NAMES: &[&str] = &[];
#[cfg(not(any(windows, target_os = "macos")))]
const CLIENT_VERSIONED_NAMES: &[&str] = &["libfbclient.so.2"];

const EMBEDDED_BASE_NAMES: &[&str] = &["fbembed"];

impl LibraryKind {
    /// Platform file names tried for this kind, in order, without any
    /// directory.
    #[must_use]
    pub fn default_names(self) -> Vec<OsString> {
        let client = CLIENT_BASE_NAMES
            .iter()
            .map(libloading::library_filename)
            .chain(CLIENT_VERSIONED_NAMES.iter().map(OsString::from));
        match self {
            Self::Client => client.collect(),
            Self::Embedded => EMBEDDED_BASE_NAMES
                .iter()
                .map(libloading::library_filename)
                .chain(client)
                .collect(),
        }
    }
}

/// Discovery mechanism for a bundled embedded engine.
pub trait EmbeddedProvider: Send + Sync {
    /// Provider name used in diagnostics.
    fn name(&self) -> &str;
    /// Engine version shipped by the provider.
    fn version(&self) -> &str;
    /// Absolute path of the library to load.
    ///
    /// # Errors
    ///
    /// [`LoadError::Embedded`] if the provider cannot supply a usable path.
    fn library_entry_point(&self) -> Result<PathBuf, LoadError>;
}

/// Resolves `relative` inside `root`. Returns `None` for absolute paths and
/// for paths that climb out of `root`.
#[must_use]
pub fn safe_resolve(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut depth: usize = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => depth = depth.checked_sub(1)?,
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(relative))
}

/// Embedded engine installed in a directory, with the library at a
/// relative entry point.
#[derive(Debug, Clone)]
pub struct DirectoryEmbeddedProvider {
    name: String,
    version: String,
    root: PathBuf,
    entry_point: PathBuf,
}

impl DirectoryEmbeddedProvider {
    /// Creates a provider for the engine installed under `root`.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        root: impl Into<PathBuf>,
        entry_point: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            root: root.into(),
            entry_point: entry_point.into(),
        }
    }

    /// Installation directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn error(&self, reason: String) -> LoadError {
        LoadError::Embedded {
            provider: self.name.clone(),
            reason,
        }
    }
}

impl EmbeddedProvider for DirectoryEmbeddedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn library_entry_point(&self) -> Result<PathBuf, LoadError> {
        let path = safe_resolve(&self.root, &self.entry_point).ok_or_else(|| {
            self.error(format!(
                "entry point {} escapes {}",
                self.entry_point.display(),
                self.root.display()
            ))
        })?;
        if !path.is_file() {
            return Err(self.error(format!("entry point {} does not exist", path.display())));
        }
        Ok(path)
    }
}

type Opener<T> = dyn Fn(&OsStr) -> Result<T, LoadError> + Send + Sync;
type LoadHook<T> = dyn Fn(&Arc<T>) + Send + Sync;

/// Loads one library of a given kind at most once.
pub struct LibraryLoader<T> {
    kind: LibraryKind,
    providers: Vec<Arc<dyn EmbeddedProvider>>,
    opener: Box<Opener<T>>,
    on_load: Option<Box<LoadHook<T>>>,
    loaded: RwLock<Option<Arc<T>>>,
}

impl<T> std::fmt::Debug for LibraryLoader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLoader")
            .field("kind", &self.kind)
            .field("providers", &self.providers.len())
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl<T> LibraryLoader<T> {
    /// Creates a loader that opens candidates with `opener`.
    pub fn new(
        kind: LibraryKind,
        opener: impl Fn(&OsStr) -> Result<T, LoadError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            providers: Vec::new(),
            opener: Box::new(opener),
            on_load: None,
            loaded: RwLock::new(None),
        }
    }

    /// Adds an embedded provider; providers are consulted before any
    /// library name, in the order added. Ignored for client loaders.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddedProvider>) -> Self {
        if self.kind == LibraryKind::Embedded {
            self.providers.push(provider);
        } else {
            log::debug!("ignoring embedded provider {} for client loader", provider.name());
        }
        self
    }

    /// Runs `hook` once, right after the library was loaded.
    #[must_use]
    pub fn on_load(mut self, hook: impl Fn(&Arc<T>) + Send + Sync + 'static) -> Self {
        self.on_load = Some(Box::new(hook));
        self
    }

    /// Kind of library this loader loads.
    #[must_use]
    pub const fn kind(&self) -> LibraryKind {
        self.kind
    }

    /// Returns `true` once a library was loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }

    /// The loaded library, if any.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn candidate_list(&self, search_path: Option<&Path>) -> Vec<Result<OsString, LoadAttempt>> {
        let mut list: Vec<Result<OsString, LoadAttempt>> = self
            .providers
            .iter()
            .map(|provider| {
                provider
                    .library_entry_point()
                    .map(PathBuf::into_os_string)
                    .map_err(|e| LoadAttempt {
                        candidate: format!("{} {}", provider.name(), provider.version()),
                        reason: e.to_string(),
                    })
            })
            .collect();
        let names = self.kind.default_names();
        if let Some(dir) = search_path {
            list.extend(names.iter().map(|name| Ok(dir.join(name).into_os_string())));
        }
        list.extend(names.into_iter().map(Ok));
        list
    }

    /// Candidates that will be tried, in order.
    #[must_use]
    pub fn candidates(&self, search_path: Option<&Path>) -> Vec<OsString> {
        self.candidate_list(search_path)
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    /// Returns the loaded library, loading it first if necessary.
    ///
    /// `search_path` only matters for the call that actually loads.
    ///
    /// # Errors
    ///
    /// [`LoadError::NoCandidateLoaded`] listing every failed candidate.
    pub fn load(&self, search_path: Option<&Path>) -> Result<Arc<T>, LoadError> {
        if let Some(library) = self.get() {
            return Ok(library);
        }
        let mut slot = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(library) = slot.as_ref() {
            return Ok(Arc::clone(library));
        }

        let mut attempts = Vec::new();
        for candidate in self.candidate_list(search_path) {
            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(attempt) => {
                    log::debug!("{} candidate skipped: {}", self.kind, attempt.reason);
                    attempts.push(attempt);
                    continue;
                }
            };
            match (self.opener)(&candidate) {
                Ok(library) => {
                    log::info!(
                        "loaded {} library {}",
                        self.kind,
                        candidate.to_string_lossy()
                    );
                    let library = Arc::new(library);
                    if let Some(hook) = &self.on_load {
                        hook(&library);
                    }
                    *slot = Some(Arc::clone(&library));
                    return Ok(library);
                }
                Err(e) => {
                    log::debug!("could not load {}: {e}", candidate.to_string_lossy());
                    attempts.push(LoadAttempt {
                        candidate: candidate.to_string_lossy().into_owned(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(LoadError::NoCandidateLoaded { attempts })
    }
}
