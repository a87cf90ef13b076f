//! Entry point of the bridge: picks the client library and builds unattached
//! [`Database`] and [`Service`] objects with the right attach string.
//!
//! A factory loads its library once. The native library path of the first
//! connection that triggers the load wins; later connections asking for a
//! different path get the already loaded library.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use strum::Display;

use crate::client::FbClientApi;
use crate::config::{AttachProperties, ConnectionProperties, ServiceProperties};
use crate::db::{Database, Service};
use crate::error::FbResult;
use crate::features::ClientFeatures;
use crate::ffi::ClientLibrary;
use crate::loader::{EmbeddedProvider, LibraryKind, LibraryLoader};
use crate::tracker::{NativeResource, ResourceTracker};

/// Which library a factory uses and how it addresses databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FactoryKind {
    /// `fbclient`, with `server/port:path` attach strings.
    Client,
    /// Embedded engine; the server name is ignored.
    Embedded,
    /// `fbclient` with bare paths, for local protocol access.
    Local,
}

impl FactoryKind {
    const fn library_kind(self) -> LibraryKind {
        match self {
            Self::Embedded => LibraryKind::Embedded,
            Self::Client | Self::Local => LibraryKind::Client,
        }
    }
}

/// Builds the attach string for `object` on `server`.
///
/// Without a server the object is used as is. IPv6 literals are bracketed.
#[must_use]
pub fn attach_string(server: Option<&str>, port: u16, object: &str) -> String {
    match server.map(str::trim).filter(|server| !server.is_empty()) {
        None => object.to_string(),
        Some(server) if server.contains(':') && !server.starts_with('[') => {
            format!("[{server}]/{port}:{object}")
        }
        Some(server) => format!("{server}/{port}:{object}"),
    }
}

enum LibrarySource {
    Native(LibraryLoader<ClientLibrary>),
    Provided(Arc<dyn FbClientApi>),
}

/// Creates databases and service connections over one client library.
pub struct DatabaseFactory {
    kind: FactoryKind,
    source: LibrarySource,
    first_search_path: OnceLock<Option<PathBuf>>,
}

impl std::fmt::Debug for DatabaseFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseFactory")
            .field("kind", &self.kind)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

static CLIENT: OnceLock<DatabaseFactory> = OnceLock::new();
static EMBEDDED: OnceLock<DatabaseFactory> = OnceLock::new();
static LOCAL: OnceLock<DatabaseFactory> = OnceLock::new();

impl DatabaseFactory {
    /// Factory loading the native library for `kind` on first use. The
    /// loaded library is tracked for disposal at process exit.
    #[must_use]
    pub fn new(kind: FactoryKind) -> Self {
        let loader = LibraryLoader::new(kind.library_kind(), |candidate: &OsStr| {
            ClientLibrary::open(candidate)
        })
        .on_load(|library: &Arc<ClientLibrary>| {
            let resource: Arc<dyn NativeResource> = library.clone();
            ResourceTracker::global().register_weak(&resource);
        });
        Self {
            kind,
            source: LibrarySource::Native(loader),
            first_search_path: OnceLock::new(),
        }
    }

    /// Factory over an already available client implementation.
    #[must_use]
    pub fn with_client(kind: FactoryKind, client: Arc<dyn FbClientApi>) -> Self {
        Self {
            kind,
            source: LibrarySource::Provided(client),
            first_search_path: OnceLock::new(),
        }
    }

    /// Adds an embedded provider consulted before the default library
    /// names. Only embedded factories that load a native library use it.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddedProvider>) -> Self {
        if let LibrarySource::Native(loader) = self.source {
            self.source = LibrarySource::Native(loader.with_provider(provider));
        }
        self
    }

    /// Process-wide factory of `kind`.
    pub fn shared(kind: FactoryKind) -> &'static Self {
        let cell = match kind {
            FactoryKind::Client => &CLIENT,
            FactoryKind::Embedded => &EMBEDDED,
            FactoryKind::Local => &LOCAL,
        };
        cell.get_or_init(|| Self::new(kind))
    }

    /// Kind of this factory.
    #[must_use]
    pub const fn kind(&self) -> FactoryKind {
        self.kind
    }

    /// Returns `true` once the client library is available.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match &self.source {
            LibrarySource::Native(loader) => loader.is_loaded(),
            LibrarySource::Provided(_) => true,
        }
    }

    /// Features of the loaded library, `None` before the first load.
    #[must_use]
    pub fn features(&self) -> Option<ClientFeatures> {
        match &self.source {
            LibrarySource::Native(loader) => loader.get().map(|library| library.features().clone()),
            LibrarySource::Provided(client) => Some(client.features().clone()),
        }
    }

    /// The client library, loaded on first call from `search_path` (then
    /// the default names).
    ///
    /// # Errors
    ///
    /// [`FbError::Load`](crate::error::FbError::Load) if no candidate could
    /// be loaded.
    pub fn library(&self, search_path: Option<&Path>) -> FbResult<Arc<dyn FbClientApi>> {
        let loader = match &self.source {
            LibrarySource::Provided(client) => return Ok(Arc::clone(client)),
            LibrarySource::Native(loader) => loader,
        };
        let library = loader.load(search_path)?;
        let first = self
            .first_search_path
            .get_or_init(|| search_path.map(Path::to_path_buf));
        if first.as_deref() != search_path {
            log::debug!(
                "{} library already loaded from {first:?}; ignoring {search_path:?}",
                self.kind
            );
        }
        Ok(library)
    }

    fn attach_name(&self, properties: &impl AttachProperties, object: &str) -> String {
        match self.kind {
            FactoryKind::Client => {
                attach_string(properties.server_name(), properties.port_number(), object)
            }
            FactoryKind::Embedded | FactoryKind::Local => object.to_string(),
        }
    }

    /// Attach string this factory uses for `properties`.
    #[must_use]
    pub fn database_attach_string(&self, properties: &ConnectionProperties) -> String {
        self.attach_name(properties, &properties.database_name)
    }

    /// Attach string this factory uses for the service manager.
    #[must_use]
    pub fn service_attach_string(&self, properties: &ServiceProperties) -> String {
        self.attach_name(properties, properties.effective_service_name())
    }

    /// Unattached database for `properties`.
    ///
    /// # Errors
    ///
    /// Library load errors.
    pub fn connect(&self, properties: ConnectionProperties) -> FbResult<Database> {
        let client = self.library(properties.native_library_path())?;
        let attach_name = self.database_attach_string(&properties);
        Ok(Database::new(client, properties, attach_name))
    }

    /// Unattached service manager connection for `properties`.
    ///
    /// # Errors
    ///
    /// Library load errors.
    pub fn connect_service(&self, properties: ServiceProperties) -> FbResult<Service> {
        let client = self.library(properties.native_library_path())?;
        let attach_name = self.service_attach_string(&properties);
        Ok(Service::new(client, properties, attach_name))
    }
}
