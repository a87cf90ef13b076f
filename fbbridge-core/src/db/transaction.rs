use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum::Display;

use super::database::{DatabaseInner, Session};
use super::registry::{ResourceId, ResourceKind};
use crate::consts::{ISC_BAD_TRANS_HANDLE, ISC_TRA_STATE};
use crate::error::{FbError, FbResult};
use crate::features::ClientFeature;
use crate::ffi::{DbHandle, StatusVector, TrHandle};
use crate::info::{parse_transaction_id, TRANSACTION_ID_ITEMS};
use crate::params::ParameterBuffer;

const TRANSACTION_INFO_BUFFER: usize = 32;

/// Transaction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransactionState {
    /// Created, not started.
    None,
    /// `isc_start_multiple` in progress.
    Starting,
    /// Started.
    Active,
    /// `isc_prepare_transaction2` in progress.
    Preparing,
    /// Prepared for two-phase commit.
    Prepared,
    /// Commit in progress.
    Committing,
    /// Committed.
    Committed,
    /// Rollback in progress.
    RollingBack,
    /// Rolled back.
    RolledBack,
}

impl TransactionState {
    const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Prepared)
    }
}

struct Transition {
    action: &'static str,
    allowed: &'static [TransactionState],
    during: TransactionState,
    after: TransactionState,
    /// Whether the native handle is gone once the call succeeded.
    releases: bool,
}

struct TransactionInner {
    db: Arc<DatabaseInner>,
    id: ResourceId,
    state: Mutex<TransactionState>,
}

impl Drop for TransactionInner {
    fn drop(&mut self) {
        let state = *self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Ok(mut session) = self.db.lock() else {
            return;
        };
        let current = session.owns(self.id);
        let Some(mut handle) = session.registry.remove(self.id) else {
            return;
        };
        if handle == 0 {
            return;
        }
        let mut status = StatusVector::new();
        let result = if current {
            if !state.is_open() {
                return;
            }
            log::debug!("rolling back abandoned transaction {}", self.id.get());
            self.db.client.rollback_transaction(&mut status, &mut handle)
        } else if self.db.has_feature(ClientFeature::FbDisconnectTransaction) {
            log::debug!(
                "disconnecting transaction {} of a closed attachment",
                self.id.get()
            );
            self.db.client.disconnect_transaction(&mut status, &mut handle)
        } else {
            return;
        };
        match result {
            Err(error) => log::debug!("transaction cleanup failed: {error}"),
            Ok(()) if status.has_error() => log::debug!("transaction cleanup reported an error"),
            Ok(()) => {}
        }
    }
}

/// A transaction of a [`Database`](super::Database).
///
/// Cloning shares the transaction. When the last clone is dropped an open
/// transaction is rolled back, or disconnected if its attachment is gone
/// and the library has `fb_disconnect_transaction`.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(db: Arc<DatabaseInner>) -> FbResult<Self> {
        let id = db.lock_attached()?.registry.insert(ResourceKind::Transaction);
        Ok(Self {
            inner: Arc::new(TransactionInner {
                db,
                id,
                state: Mutex::new(TransactionState::None),
            }),
        })
    }

    fn lock_state(&self) -> FbResult<MutexGuard<'_, TransactionState>> {
        self.inner
            .state
            .lock()
            .map_err(|_| FbError::Poisoned("transaction"))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Native handle, `0` if not started or already ended.
    #[must_use]
    pub fn handle(&self) -> TrHandle {
        self.inner
            .db
            .lock()
            .ok()
            .and_then(|session| session.registry.handle(self.inner.id))
            .unwrap_or(0)
    }

    pub(crate) fn belongs_to(&self, db: &Arc<DatabaseInner>) -> bool {
        Arc::ptr_eq(&self.inner.db, db)
    }

    /// Handle of an active transaction, for statements and blobs. The
    /// caller holds the database lock, which is always taken before the
    /// transaction state lock.
    pub(crate) fn native_handle(&self, session: &Session) -> FbResult<TrHandle> {
        let state = self.state();
        if state != TransactionState::Active {
            return Err(FbError::illegal_state_code(
                ISC_TRA_STATE,
                format!("transaction is {state}, not active"),
            ));
        }
        self.slot_handle(session)
            .filter(|handle| *handle != 0)
            .ok_or_else(|| {
                FbError::illegal_state_code(ISC_BAD_TRANS_HANDLE, "transaction handle is gone")
            })
    }

    fn slot_handle(&self, session: &Session) -> Option<TrHandle> {
        session
            .owns(self.inner.id)
            .then(|| session.registry.handle(self.inner.id))
            .flatten()
    }

    fn transition(
        &self,
        transition: &Transition,
        call: impl FnOnce(&mut StatusVector, &mut DbHandle, &mut TrHandle) -> FbResult<()>,
    ) -> FbResult<()> {
        let db = &self.inner.db;
        let mut session = db.lock_attached()?;
        let mut state = self.lock_state()?;
        if !transition.allowed.contains(&*state) {
            return Err(FbError::illegal_state_code(
                ISC_TRA_STATE,
                format!("cannot {} a transaction that is {}", transition.action, *state),
            ));
        }
        let mut handle = self.slot_handle(&session).ok_or_else(|| {
            FbError::illegal_state_code(
                ISC_BAD_TRANS_HANDLE,
                "transaction belongs to a closed attachment",
            )
        })?;
        let mut db_handle = session.handle;
        let previous = *state;
        *state = transition.during;
        let mut status = StatusVector::new();
        let result =
            call(&mut status, &mut db_handle, &mut handle).and_then(|()| db.check(&status));
        match result {
            Ok(()) => {
                *state = transition.after;
                let stored = if transition.releases { 0 } else { handle };
                session.registry.set_handle(self.inner.id, stored);
                log::trace!("transaction {} {}", self.inner.id.get(), transition.after);
                Ok(())
            }
            Err(error) => {
                *state = previous;
                Err(error)
            }
        }
    }

    pub(crate) fn begin(&self, tpb: &ParameterBuffer) -> FbResult<()> {
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "start",
                allowed: &[TransactionState::None],
                during: TransactionState::Starting,
                after: TransactionState::Active,
                releases: false,
            },
            |status, db, tr| client.start_transaction(status, tr, db, tpb.as_bytes()),
        )
    }

    pub(crate) fn reconnect(&self, transaction_id: i64) -> FbResult<()> {
        let id_bytes = reconnect_id_bytes(transaction_id);
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "reconnect",
                allowed: &[TransactionState::None],
                during: TransactionState::Starting,
                after: TransactionState::Prepared,
                releases: false,
            },
            |status, db, tr| client.reconnect_transaction(status, db, tr, &id_bytes),
        )
    }

    /// Commits. Committing a committed transaction does nothing.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless active or prepared; errors reported
    /// by the library, after which the transaction is still open.
    pub fn commit(&self) -> FbResult<()> {
        if self.state() == TransactionState::Committed {
            log::debug!("transaction {} already committed", self.inner.id.get());
            return Ok(());
        }
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "commit",
                allowed: &[TransactionState::Active, TransactionState::Prepared],
                during: TransactionState::Committing,
                after: TransactionState::Committed,
                releases: true,
            },
            |status, _, tr| client.commit_transaction(status, tr),
        )
    }

    /// Commits and keeps the transaction context open.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless active; errors reported by the
    /// library.
    pub fn commit_retaining(&self) -> FbResult<()> {
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "commit retaining",
                allowed: &[TransactionState::Active],
                during: TransactionState::Committing,
                after: TransactionState::Active,
                releases: false,
            },
            |status, _, tr| client.commit_retaining(status, tr),
        )
    }

    /// Rolls back. Rolling back a rolled back transaction does nothing.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless active or prepared; errors reported
    /// by the library.
    pub fn rollback(&self) -> FbResult<()> {
        if self.state() == TransactionState::RolledBack {
            log::debug!("transaction {} already rolled back", self.inner.id.get());
            return Ok(());
        }
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "roll back",
                allowed: &[TransactionState::Active, TransactionState::Prepared],
                during: TransactionState::RollingBack,
                after: TransactionState::RolledBack,
                releases: true,
            },
            |status, _, tr| client.rollback_transaction(status, tr),
        )
    }

    /// Rolls back and keeps the transaction context open.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless active; errors reported by the
    /// library.
    pub fn rollback_retaining(&self) -> FbResult<()> {
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "roll back retaining",
                allowed: &[TransactionState::Active],
                during: TransactionState::RollingBack,
                after: TransactionState::Active,
                releases: false,
            },
            |status, _, tr| client.rollback_retaining(status, tr),
        )
    }

    /// First phase of a two-phase commit. `message` is stored with the
    /// limbo transaction.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless active; errors reported by the
    /// library.
    pub fn prepare(&self, message: &[u8]) -> FbResult<()> {
        let client = &self.inner.db.client;
        self.transition(
            &Transition {
                action: "prepare",
                allowed: &[TransactionState::Active],
                during: TransactionState::Preparing,
                after: TransactionState::Prepared,
                releases: false,
            },
            |status, _, tr| client.prepare_transaction(status, tr, message),
        )
    }

    /// Raw `isc_transaction_info` response for `items`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if the transaction has no native handle;
    /// errors reported by the library.
    pub fn transaction_info(&self, items: &[u8], buffer_length: usize) -> FbResult<Vec<u8>> {
        let db = &self.inner.db;
        let session = db.lock_attached()?;
        let mut handle = self
            .slot_handle(&session)
            .filter(|handle| *handle != 0)
            .ok_or_else(|| {
                FbError::illegal_state_code(ISC_BAD_TRANS_HANDLE, "transaction is not started")
            })?;
        let mut status = StatusVector::new();
        let mut buffer = vec![0; buffer_length];
        db.client
            .transaction_info(&mut status, &mut handle, items, &mut buffer)?;
        db.check(&status)?;
        Ok(buffer)
    }

    /// Server side transaction id.
    ///
    /// # Errors
    ///
    /// As [`Transaction::transaction_info`]; [`FbError::InvalidArgument`]
    /// if the response lacks the id.
    pub fn transaction_id(&self) -> FbResult<i64> {
        let buffer = self.transaction_info(TRANSACTION_ID_ITEMS, TRANSACTION_INFO_BUFFER)?;
        parse_transaction_id(&buffer)
    }
}

/// Transaction id argument of `isc_reconnect_transaction`: the low four
/// bytes for ids up to `u32::MAX`, all eight above.
fn reconnect_id_bytes(transaction_id: i64) -> Vec<u8> {
    u32::try_from(transaction_id).map_or_else(
        |_| transaction_id.to_le_bytes().to_vec(),
        |id| id.to_le_bytes().to_vec(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(42, &[42, 0, 0, 0] ; "small id")]
    #[test_case(0x8000_0000, &[0, 0, 0, 0x80] ; "above i32 max")]
    #[test_case(0xFFFF_FFFF, &[0xFF; 4] ; "u32 max")]
    #[test_case(0x1_0000_0000, &[0, 0, 0, 0, 1, 0, 0, 0] ; "above u32 max")]
    fn reconnect_ids(transaction_id: i64, expected: &[u8]) {
        assert_eq!(reconnect_id_bytes(transaction_id), expected);
    }
}
