//! Process-wide tracking of native resources for deterministic shutdown.
//!
//! Loaded client libraries register here. At process exit a destructor
//! disposes everything still tracked, unless the host disabled that hook
//! and takes care of [`ResourceTracker::shutdown`] itself.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError, Weak};

/// A native resource with an explicit disposal step.
pub trait NativeResource: Send + Sync {
    /// Releases the resource. Must be idempotent and must not panic; errors
    /// are logged by the implementation.
    fn dispose(&self);

    /// Short description for log messages.
    fn describe(&self) -> String {
        "native resource".to_string()
    }
}

enum Registration {
    Weak(Weak<dyn NativeResource>),
    Strong(Arc<dyn NativeResource>),
}

impl Registration {
    fn resource(&self) -> Option<Arc<dyn NativeResource>> {
        match self {
            Self::Weak(weak) => weak.upgrade(),
            Self::Strong(strong) => Some(Arc::clone(strong)),
        }
    }
}

/// Handle returned by a registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceToken(u64);

/// Registry of native resources to dispose on shutdown.
pub struct ResourceTracker {
    entries: Mutex<Vec<(ResourceToken, Registration)>>,
    next_id: AtomicU64,
    hook: Once,
    hook_installed: AtomicBool,
    hook_disabled: AtomicBool,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("tracked", &self.tracked_count())
            .field("hook_installed", &self.is_shutdown_hook_installed())
            .field("hook_disabled", &self.hook_disabled.load(Ordering::Acquire))
            .finish()
    }
}

static GLOBAL: OnceLock<ResourceTracker> = OnceLock::new();

impl ResourceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            hook: Once::new(),
            hook_installed: AtomicBool::new(false),
            hook_disabled: AtomicBool::new(false),
        }
    }

    /// The process-wide tracker.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Tracks `resource` without keeping it alive.
    pub fn register_weak(&self, resource: &Arc<dyn NativeResource>) -> ResourceToken {
        self.register(Registration::Weak(Arc::downgrade(resource)))
    }

    /// Tracks `resource` and keeps it alive until shutdown or
    /// [`ResourceTracker::unregister`].
    pub fn register_strong(&self, resource: Arc<dyn NativeResource>) -> ResourceToken {
        self.register(Registration::Strong(resource))
    }

    fn register(&self, registration: Registration) -> ResourceToken {
        self.install_shutdown_hook();
        let token = ResourceToken(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // forget registrations whose resource is gone
        entries.retain(|(_, r)| !matches!(r, Registration::Weak(w) if w.strong_count() == 0));
        entries.push((token, registration));
        token
    }

    /// Stops tracking the resource behind `token`. Returns `false` if it was
    /// not tracked.
    pub fn unregister(&self, token: ResourceToken) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(t, _)| *t != token);
        entries.len() != before
    }

    /// Number of tracked resources that are still alive.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, r)| r.resource().is_some())
            .count()
    }

    fn install_shutdown_hook(&self) {
        self.hook.call_once(|| {
            log::debug!("installing native resource shutdown hook");
            self.hook_installed.store(true, Ordering::Release);
        });
    }

    /// Returns `true` once the first registration armed the shutdown hook.
    #[must_use]
    pub fn is_shutdown_hook_installed(&self) -> bool {
        self.hook_installed.load(Ordering::Acquire)
    }

    /// Prevents the process-exit hook from disposing resources. The host
    /// must call [`ResourceTracker::shutdown`] itself.
    pub fn disable_shutdown_hook(&self) {
        self.hook_disabled.store(true, Ordering::Release);
        log::debug!("native resource shutdown hook disabled");
    }

    /// Returns `true` if the process-exit hook would dispose resources.
    #[must_use]
    pub fn is_shutdown_hook_enabled(&self) -> bool {
        self.is_shutdown_hook_installed() && !self.hook_disabled.load(Ordering::Acquire)
    }

    /// Disposes every tracked resource and clears the registry.
    ///
    /// Safe to call repeatedly. A panicking disposal is logged and does not
    /// stop the remaining ones.
    pub fn shutdown(&self) {
        let entries = std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner));
        for (_, registration) in entries {
            let Some(resource) = registration.resource() else {
                continue;
            };
            let description = resource.describe();
            if catch_unwind(AssertUnwindSafe(|| resource.dispose())).is_err() {
                log::error!("disposal of {description} panicked");
            } else {
                log::debug!("disposed {description}");
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[ctor::dtor]
fn dispose_native_resources_at_exit() {
    if let Some(tracker) = GLOBAL.get() {
        if tracker.is_shutdown_hook_enabled() {
            tracker.shutdown();
        }
    }
}
