use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::FbClientApi;
use crate::config::ServiceProperties;
use crate::error::{FbError, FbResult};
use crate::ffi::{StatusVector, SvcHandle};
use crate::params::ParameterBuffer;
use crate::status;

/// A service manager connection.
///
/// Dropping an attached service detaches it, ignoring errors.
pub struct Service {
    client: Arc<dyn FbClientApi>,
    properties: ServiceProperties,
    attach_name: String,
    handle: Mutex<SvcHandle>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("attach_name", &self.attach_name)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Creates an unattached service connection. No native call is made.
    #[must_use]
    pub fn new(
        client: Arc<dyn FbClientApi>,
        properties: ServiceProperties,
        attach_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            properties,
            attach_name: attach_name.into(),
            handle: Mutex::new(0),
        }
    }

    /// Attach string passed to the library.
    #[must_use]
    pub fn attach_name(&self) -> &str {
        &self.attach_name
    }

    /// Connection properties.
    #[must_use]
    pub const fn properties(&self) -> &ServiceProperties {
        &self.properties
    }

    /// Native service handle, `0` when not attached.
    #[must_use]
    pub fn handle(&self) -> SvcHandle {
        self.lock().map_or(0, |handle| *handle)
    }

    /// Returns `true` while attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.handle() != 0
    }

    fn lock(&self) -> FbResult<MutexGuard<'_, SvcHandle>> {
        self.handle.lock().map_err(|_| FbError::Poisoned("service"))
    }

    fn check(&self, status: &StatusVector) -> FbResult<()> {
        status::process(status, self.properties.encoding, None)
    }

    fn lock_attached(&self) -> FbResult<MutexGuard<'_, SvcHandle>> {
        let handle = self.lock()?;
        if *handle == 0 {
            return Err(FbError::illegal_state("service is not attached"));
        }
        Ok(handle)
    }

    /// Attaches to the service manager.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if already attached.
    /// * [`FbError::LimitExceeded`] if a property is too long.
    /// * Errors reported by the library.
    pub fn attach(&self) -> FbResult<()> {
        let spb = ParameterBuffer::for_service(&self.properties)?;
        let mut guard = self.lock()?;
        if *guard != 0 {
            return Err(FbError::illegal_state("service is already attached"));
        }
        let mut handle: SvcHandle = 0;
        let mut status = StatusVector::new();
        let result = self
            .client
            .service_attach(
                &mut status,
                self.attach_name.as_bytes(),
                &mut handle,
                spb.as_bytes(),
            )
            .and_then(|()| self.check(&status));
        if let Err(error) = result {
            if handle != 0 {
                let mut cleanup = StatusVector::new();
                if let Err(detach_error) = self.client.service_detach(&mut cleanup, &mut handle) {
                    log::debug!("detach after failed service attach failed: {detach_error}");
                }
            }
            return Err(error);
        }
        *guard = handle;
        log::debug!("attached to service manager {}", self.attach_name);
        Ok(())
    }

    /// Sends a query. `send` carries query options, `request` the items
    /// asked for.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached; errors reported by the
    /// library.
    pub fn query(&self, send: &[u8], request: &[u8], buffer_length: usize) -> FbResult<Vec<u8>> {
        let guard = self.lock_attached()?;
        let mut handle = *guard;
        let mut status = StatusVector::new();
        let mut buffer = vec![0; buffer_length];
        self.client
            .service_query(&mut status, &mut handle, send, request, &mut buffer)?;
        self.check(&status)?;
        Ok(buffer)
    }

    /// Starts a service action described by `request`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached; errors reported by the
    /// library.
    pub fn start(&self, request: &[u8]) -> FbResult<()> {
        let guard = self.lock_attached()?;
        let mut handle = *guard;
        let mut status = StatusVector::new();
        self.client.service_start(&mut status, &mut handle, request)?;
        self.check(&status)
    }

    /// Detaches. Detaching an unattached service does nothing.
    ///
    /// # Errors
    ///
    /// Errors reported by the library; the service stays attached.
    pub fn detach(&self) -> FbResult<()> {
        let mut guard = self.lock()?;
        if *guard == 0 {
            return Ok(());
        }
        let mut handle = *guard;
        let mut status = StatusVector::new();
        self.client.service_detach(&mut status, &mut handle)?;
        self.check(&status)?;
        *guard = 0;
        log::debug!("detached from service manager {}", self.attach_name);
        Ok(())
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        let handle = self
            .handle
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *handle == 0 {
            return;
        }
        let mut status = StatusVector::new();
        if let Err(error) = self.client.service_detach(&mut status, handle) {
            log::debug!("detaching abandoned service failed: {error}");
        }
        *handle = 0;
    }
}
