//! Handle lifecycle layer: databases, transactions, statements, blobs,
//! events and service connections on top of [`FbClientApi`].
//!
//! Every native call goes through the lock of the owning [`Database`] and
//! its status vector is processed before the result is used. Releasing a
//! handle twice is a no-op; dropping an unreleased handle releases it on a
//! best-effort basis with errors logged at debug level.
//!
//! [`FbClientApi`]: crate::client::FbClientApi

mod blob;
mod database;
mod event;
mod registry;
mod service;
mod statement;
mod transaction;

pub use blob::{Blob, BlobState, SeekMode};
pub use database::Database;
pub use event::{EventHandle, EventHandler};
pub use registry::{ResourceId, ResourceKind};
pub use service::Service;
pub use statement::{ExecuteResult, Statement, StatementState};
pub use transaction::{Transaction, TransactionState};

use crate::error::FbError;

/// Told about every error raised through a database, before the error is
/// returned to the caller.
pub trait ExceptionListener: Send + Sync {
    /// Called with the error about to be returned.
    fn error_occurred(&self, error: &FbError);
}
