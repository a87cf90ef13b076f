//! Cancellation channel for long running statement operations.
//!
//! Before a statement executes or fetches it announces an [`Operation`] to
//! the registered [`OperationAware`] observer. The observer (typically a
//! watchdog on another thread) may call [`Operation::cancel`]:
//!
//! * before the native call is issued, the statement skips the call and
//!   fails with `isc_cancelled`;
//! * while the native call runs, the request is forwarded to
//!   `fb_cancel_operation` without taking the database lock;
//! * after the operation ended, cancelling is an illegal state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use strum::Display;

use crate::consts::{FB_CANCEL_ABORT, FB_CANCEL_DISABLE, FB_CANCEL_ENABLE, FB_CANCEL_RAISE};
use crate::error::{FbError, FbResult};

/// Kind of statement operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationKind {
    /// Statement execution.
    Execute,
    /// Row fetch.
    Fetch,
}

/// Argument of `fb_cancel_operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CancelKind {
    /// Disallow cancellation for the connection.
    Disable,
    /// Allow cancellation again.
    Enable,
    /// Cancel the running request.
    Raise,
    /// Hard abort; the connection is unusable afterwards.
    Abort,
}

impl CancelKind {
    /// Native `fb_cancel_*` value.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Disable => FB_CANCEL_DISABLE,
            Self::Enable => FB_CANCEL_ENABLE,
            Self::Raise => FB_CANCEL_RAISE,
            Self::Abort => FB_CANCEL_ABORT,
        }
    }
}

/// Something that can cancel the running request of a connection.
pub trait OperationCanceller: Send + Sync {
    /// Issues `fb_cancel_operation` with `kind`.
    ///
    /// # Errors
    ///
    /// Whatever the native call reports.
    fn cancel_operation(&self, kind: CancelKind) -> FbResult<()>;
}

/// Observer told about the start and end of every statement operation.
pub trait OperationAware: Send + Sync {
    /// Called before the native call is issued.
    fn start_operation(&self, operation: &Arc<Operation>);
    /// Called once the operation completed, failed or was cancelled.
    fn end_operation(&self, operation: &Arc<Operation>);
}

const SIGNALLED: u8 = 0;
const CANCELLED: u8 = 1;
const RUNNING: u8 = 2;
const ENDED: u8 = 3;

/// A statement operation in flight.
pub struct Operation {
    kind: OperationKind,
    state: AtomicU8,
    canceller: Weak<dyn OperationCanceller>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("state", &self.state.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// Kind of operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns `true` once the operation finished.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.state.load(Ordering::Acquire) == ENDED
    }

    /// Requests cancellation.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if the operation already ended or its
    ///   connection is gone.
    /// * Errors of `fb_cancel_operation` while the native call runs.
    pub fn cancel(&self) -> FbResult<()> {
        match self
            .state
            .compare_exchange(SIGNALLED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(CANCELLED) => Ok(()),
            Err(RUNNING) => {
                let canceller = self
                    .canceller
                    .upgrade()
                    .ok_or_else(|| FbError::illegal_state("connection of operation is closed"))?;
                log::debug!("cancelling running {} operation", self.kind);
                canceller.cancel_operation(CancelKind::Raise)
            }
            Err(_) => Err(FbError::illegal_state(format!(
                "{} operation already completed",
                self.kind
            ))),
        }
    }
}

/// Scope of one operation, ended on drop.
pub(crate) struct OperationScope {
    operation: Arc<Operation>,
    observer: Option<Arc<dyn OperationAware>>,
}

impl OperationScope {
    /// Announces a new operation to `observer`.
    pub(crate) fn begin(
        kind: OperationKind,
        canceller: Weak<dyn OperationCanceller>,
        observer: Option<Arc<dyn OperationAware>>,
    ) -> Self {
        let operation = Arc::new(Operation {
            kind,
            state: AtomicU8::new(SIGNALLED),
            canceller,
        });
        if let Some(observer) = &observer {
            observer.start_operation(&operation);
        }
        Self {
            operation,
            observer,
        }
    }

    /// Moves the operation into the running state right before the native
    /// call.
    ///
    /// # Errors
    ///
    /// `isc_cancelled` if the observer cancelled the operation first.
    pub(crate) fn enter_native_call(&self) -> FbResult<()> {
        match self.operation.state.compare_exchange(
            SIGNALLED,
            RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(_) => {
                log::debug!("{} operation cancelled before native call", self.operation.kind);
                Err(FbError::database(crate::consts::ISC_CANCELLED))
            }
        }
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        self.operation.state.store(ENDED, Ordering::Release);
        if let Some(observer) = &self.observer {
            observer.end_operation(&self.operation);
        }
    }
}
