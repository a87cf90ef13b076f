use std::ffi::CString;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use super::event::{EventHandle, EventHandler};
use super::registry::{Registry, ResourceKind};
use super::{Blob, ExceptionListener, Statement, Transaction};
use crate::client::FbClientApi;
use crate::coder::{DatatypeCoder, EncodingFactory};
use crate::config::ConnectionProperties;
use crate::consts::{ISC_BAD_DB_HANDLE, ISC_INFO_END, ISC_INFO_ODS_VERSION};
use crate::encoding::Encoding;
use crate::error::{DatabaseWarning, FbError, FbResult, StatusKind};
use crate::features::{ClientFeature, ClientFeatures};
use crate::ffi::{DbHandle, IscQuad, StatusVector};
use crate::info::{DatabaseInfo, DATABASE_INFO_ITEMS};
use crate::operation::{CancelKind, OperationAware, OperationCanceller};
use crate::params::ParameterBuffer;
use crate::status::{self, WarningCallback};

/// Longest statement text accepted with an explicit length.
pub(crate) const MAX_STATEMENT_LENGTH: usize = u16::MAX as usize;

const DATABASE_INFO_BUFFER: usize = 64;

/// State guarded by the database lock.
pub(crate) struct Session {
    pub(crate) handle: DbHandle,
    pub(crate) registry: Registry,
    pub(crate) info: DatabaseInfo,
}

impl Session {
    pub(crate) const fn is_attached(&self) -> bool {
        self.handle != 0
    }

    /// Returns `true` if `id` is a live slot of the current connection.
    pub(crate) fn owns(&self, id: super::ResourceId) -> bool {
        self.is_attached() && self.registry.is_current(id)
    }
}

/// Locked session. Listener and warning notices raised while it is held
/// are delivered once the lock is released, so callbacks may use the
/// database again.
pub(crate) struct SessionGuard<'a> {
    session: MutexGuard<'a, Session>,
    // dropped after `session`
    _deliver: DeliverNotices<'a>,
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

struct DeliverNotices<'a>(&'a DatabaseInner);

impl Drop for DeliverNotices<'_> {
    fn drop(&mut self) {
        self.0.deliver_notices();
    }
}

/// Something to tell the exception listeners or the warning callback.
enum Notice {
    Error(FbError),
    Warning(DatabaseWarning),
}

/// Shared part of a [`Database`], referenced by every handle created from
/// it.
pub(crate) struct DatabaseInner {
    pub(crate) client: Arc<dyn FbClientApi>,
    pub(crate) encoding: EncodingFactory,
    pub(crate) properties: ConnectionProperties,
    attach_name: String,
    session: Mutex<Session>,
    /// Copy of the attachment handle readable without the lock.
    attached_handle: AtomicU32,
    listeners: RwLock<Vec<Arc<dyn ExceptionListener>>>,
    warning_callback: RwLock<Option<Arc<dyn WarningCallback>>>,
    operation_observer: RwLock<Option<Arc<dyn OperationAware>>>,
    /// Notices waiting for the session lock of their thread to be released.
    notices: Mutex<Vec<(ThreadId, Notice)>>,
}

impl DatabaseInner {
    /// Locks the session. A handle cleared by an abort from another thread
    /// is applied here.
    pub(crate) fn lock(&self) -> FbResult<SessionGuard<'_>> {
        let mut session = self.session.lock().map_err(|_| FbError::Poisoned("database"))?;
        if session.handle != 0 && self.attached_handle.load(Ordering::Acquire) == 0 {
            log::debug!("applying abort of {}", self.attach_name);
            session.handle = 0;
        }
        Ok(SessionGuard {
            session,
            _deliver: DeliverNotices(self),
        })
    }

    /// Locks the session and fails unless attached.
    pub(crate) fn lock_attached(&self) -> FbResult<SessionGuard<'_>> {
        let session = self.lock()?;
        if !session.is_attached() {
            return Err(FbError::illegal_state_code(
                ISC_BAD_DB_HANDLE,
                "database is not attached",
            ));
        }
        Ok(session)
    }

    pub(crate) fn features(&self) -> &ClientFeatures {
        self.client.features()
    }

    pub(crate) fn has_feature(&self, feature: ClientFeature) -> bool {
        self.features().contains(feature)
    }

    pub(crate) fn connection_encoding(&self) -> Encoding {
        self.encoding.encoding()
    }

    pub(crate) fn coder(&self) -> Arc<dyn DatatypeCoder> {
        self.encoding.native_coder()
    }

    pub(crate) fn dialect(&self) -> u16 {
        self.properties.sql_dialect
    }

    pub(crate) fn operation_observer(&self) -> Option<Arc<dyn OperationAware>> {
        self.operation_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Processes `status`. Warnings are queued for the warning callback and
    /// errors for the exception listeners; see [`SessionGuard`].
    pub(crate) fn check(&self, status: &StatusVector) -> FbResult<()> {
        match status::decode(status, self.connection_encoding()).into_result() {
            Ok(warnings) => {
                for warning in warnings {
                    self.queue(Notice::Warning(warning));
                }
                Ok(())
            }
            Err(error) => Err(self.notify(FbError::Database(error))),
        }
    }

    /// Like [`DatabaseInner::check`], but an error whose primary code is in
    /// `expected` is returned as `Some(code)` instead of failing.
    pub(crate) fn check_expecting(
        &self,
        status: &StatusVector,
        expected: &[i32],
    ) -> FbResult<Option<i32>> {
        let decoded = status::decode(status, self.connection_encoding());
        let primary = decoded
            .entries
            .iter()
            .find(|entry| entry.kind == StatusKind::Error)
            .map(|entry| entry.code);
        match primary {
            Some(code) if expected.contains(&code) => Ok(Some(code)),
            _ => self.check(status).map(|()| None),
        }
    }

    /// Queues `error` for the exception listeners and hands it back.
    pub(crate) fn notify(&self, error: FbError) -> FbError {
        self.queue(Notice::Error(error.clone()));
        error
    }

    fn queue(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((thread::current().id(), notice));
    }

    /// Delivers the notices queued by the current thread. Must not be
    /// called with the session locked.
    pub(crate) fn deliver_notices(&self) {
        let current = thread::current().id();
        let pending: Vec<Notice> = {
            let mut queue = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
            if queue.is_empty() {
                return;
            }
            let (mine, others): (Vec<_>, Vec<_>) =
                queue.drain(..).partition(|(thread, _)| *thread == current);
            *queue = others;
            mine.into_iter().map(|(_, notice)| notice).collect()
        };
        if pending.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let callback = self
            .warning_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for notice in pending {
            match notice {
                Notice::Error(error) => {
                    for listener in &listeners {
                        listener.error_occurred(&error);
                    }
                }
                Notice::Warning(warning) => match &callback {
                    Some(callback) => callback.warning(warning),
                    None => log::warn!("{warning}"),
                },
            }
        }
    }

    fn publish_handle(&self, handle: DbHandle) {
        self.attached_handle.store(handle, Ordering::Release);
    }

    fn establish(&self, create: bool, dpb: &ParameterBuffer) -> FbResult<()> {
        let mut session = self.lock()?;
        if session.is_attached() {
            return Err(FbError::illegal_state("database is already attached"));
        }
        let mut status = StatusVector::new();
        let mut handle: DbHandle = 0;
        let name = self.attach_name.as_bytes();
        let result = if create {
            self.client
                .create_database(&mut status, name, &mut handle, dpb.as_bytes())
        } else {
            self.client
                .attach_database(&mut status, name, &mut handle, dpb.as_bytes())
        };
        let info = result
            .and_then(|()| self.check(&status))
            .and_then(|()| self.query_info(&mut status, &mut handle));
        match info {
            Ok(info) => {
                session.handle = handle;
                session.info = info;
                session.registry.advance_generation();
                self.publish_handle(handle);
                log::debug!(
                    "{} {} (ODS {}.{}, dialect {})",
                    if create { "created" } else { "attached" },
                    self.attach_name,
                    info.ods_major,
                    info.ods_minor,
                    info.dialect
                );
                Ok(())
            }
            Err(error) => {
                if handle != 0 {
                    self.safe_detach(&mut handle);
                }
                Err(error)
            }
        }
    }

    fn query_info(
        &self,
        status: &mut StatusVector,
        handle: &mut DbHandle,
    ) -> FbResult<DatabaseInfo> {
        status.reset();
        let mut buffer = vec![0; DATABASE_INFO_BUFFER];
        self.client
            .database_info(status, handle, DATABASE_INFO_ITEMS, &mut buffer)?;
        self.check(status)?;
        DatabaseInfo::parse(&buffer)
    }

    /// Detach after a failed establish; the original error wins.
    fn safe_detach(&self, handle: &mut DbHandle) {
        let mut status = StatusVector::new();
        match self.client.detach_database(&mut status, handle) {
            Ok(()) if !status.has_error() => {}
            Ok(()) => log::debug!("detach after failed attach reported an error"),
            Err(error) => log::debug!("detach after failed attach failed: {error}"),
        }
    }

    fn release(&self, drop_database: bool) -> FbResult<()> {
        let mut session = self.lock()?;
        if !session.is_attached() {
            log::debug!("{} is not attached; nothing to release", self.attach_name);
            return Ok(());
        }
        let mut status = StatusVector::new();
        let mut handle = session.handle;
        if drop_database {
            self.client.drop_database(&mut status, &mut handle)?;
        } else {
            self.client.detach_database(&mut status, &mut handle)?;
        }
        self.check(&status)?;
        session.handle = 0;
        self.publish_handle(0);
        log::debug!(
            "{} {}",
            if drop_database { "dropped" } else { "detached" },
            self.attach_name
        );
        Ok(())
    }
}

impl OperationCanceller for DatabaseInner {
    fn cancel_operation(&self, kind: CancelKind) -> FbResult<()> {
        if !self.has_feature(ClientFeature::FbCancelOperation) {
            log::debug!("fb_cancel_operation unavailable; ignoring {kind} request");
            return Ok(());
        }
        let mut handle = self.attached_handle.load(Ordering::Acquire);
        if handle == 0 {
            return Ok(());
        }
        let mut status = StatusVector::new();
        let result = self
            .client
            .cancel_operation(&mut status, &mut handle, kind.code());
        // an abort closes the attachment even when the call reports a failure
        if kind == CancelKind::Abort {
            self.publish_handle(0);
        }
        let result = result.and_then(|()| self.check(&status));
        self.deliver_notices();
        result
    }
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if session.handle == 0 || self.attached_handle.load(Ordering::Acquire) == 0 {
            return;
        }
        let mut handle = session.handle;
        log::debug!("detaching unreleased attachment {}", self.attach_name);
        let mut status = StatusVector::new();
        if let Err(error) = self.client.detach_database(&mut status, &mut handle) {
            log::debug!("detach on drop failed: {error}");
        }
        session.handle = 0;
    }
}

/// A database attachment.
///
/// Cloning shares the attachment. Transactions, statements and blobs keep
/// it alive; once the last of them is gone an attachment that was never
/// detached is detached with errors ignored.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DatabaseInner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("attach_name", &self.inner.attach_name)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates an unattached database. No native call is made.
    #[must_use]
    pub fn new(
        client: Arc<dyn FbClientApi>,
        properties: ConnectionProperties,
        attach_name: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                client,
                encoding: EncodingFactory::new(properties.encoding),
                properties,
                attach_name: attach_name.into(),
                session: Mutex::new(Session {
                    handle: 0,
                    registry: Registry::new(),
                    info: DatabaseInfo::default(),
                }),
                attached_handle: AtomicU32::new(0),
                listeners: RwLock::new(Vec::new()),
                warning_callback: RwLock::new(None),
                operation_observer: RwLock::new(None),
                notices: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach string passed to the library.
    #[must_use]
    pub fn attach_name(&self) -> &str {
        &self.inner.attach_name
    }

    /// Connection properties.
    #[must_use]
    pub fn properties(&self) -> &ConnectionProperties {
        &self.inner.properties
    }

    /// Connection encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.inner.connection_encoding()
    }

    /// Optional entry points of the library behind this database.
    #[must_use]
    pub fn features(&self) -> &ClientFeatures {
        self.inner.features()
    }

    /// Returns `true` while attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.attached_handle.load(Ordering::Acquire) != 0
    }

    /// Native attachment handle, `0` when not attached.
    #[must_use]
    pub fn handle(&self) -> DbHandle {
        self.inner.attached_handle.load(Ordering::Acquire)
    }

    /// Database properties read right after attaching.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached.
    pub fn info(&self) -> FbResult<DatabaseInfo> {
        Ok(self.inner.lock_attached()?.info)
    }

    /// Attaches to the database.
    ///
    /// If anything after the native attach fails, the attachment is
    /// detached again and the original error is returned.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if already attached.
    /// * [`FbError::LimitExceeded`] if a connection property is too long.
    /// * Errors reported by the library.
    pub fn attach(&self) -> FbResult<()> {
        let dpb = ParameterBuffer::for_connection(&self.inner.properties)?;
        self.inner.establish(false, &dpb)
    }

    /// Creates the database and attaches to it.
    ///
    /// # Errors
    ///
    /// As [`Database::attach`].
    pub fn create(&self) -> FbResult<()> {
        let dpb = ParameterBuffer::for_connection(&self.inner.properties)?;
        self.inner.establish(true, &dpb)
    }

    /// Detaches. Detaching an unattached database does nothing.
    ///
    /// # Errors
    ///
    /// Errors reported by the library; the database stays attached.
    pub fn detach(&self) -> FbResult<()> {
        self.inner.release(false)
    }

    /// Drops the database and detaches.
    ///
    /// # Errors
    ///
    /// Errors reported by the library.
    pub fn drop_database(&self) -> FbResult<()> {
        self.inner.release(true)
    }

    /// Raw `isc_database_info` response for `items`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached; errors reported by the
    /// library.
    pub fn database_info(&self, items: &[u8], buffer_length: usize) -> FbResult<Vec<u8>> {
        let session = self.inner.lock_attached()?;
        let mut handle = session.handle;
        let mut status = StatusVector::new();
        let mut buffer = vec![0; buffer_length];
        self.inner
            .client
            .database_info(&mut status, &mut handle, items, &mut buffer)?;
        self.inner.check(&status)?;
        Ok(buffer)
    }

    /// Checks the connection is alive, with `fb_ping` when available and
    /// an ODS version info request otherwise.
    ///
    /// # Errors
    ///
    /// Errors reported by the library.
    pub fn ping(&self) -> FbResult<()> {
        if self.inner.has_feature(ClientFeature::FbPing) {
            let session = self.inner.lock_attached()?;
            let mut handle = session.handle;
            let mut status = StatusVector::new();
            self.inner.client.ping(&mut status, &mut handle)?;
            self.inner.check(&status)
        } else {
            self.database_info(&[ISC_INFO_ODS_VERSION, ISC_INFO_END], 16)
                .map(|_| ())
        }
    }

    /// Sends `fb_cancel_operation`. Does not take the database lock, so it
    /// can interrupt a call running on another thread. An abort marks the
    /// database detached locally.
    ///
    /// Without `fb_cancel_operation` in the library the request is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Errors reported by the library.
    pub fn cancel_operation(&self, kind: CancelKind) -> FbResult<()> {
        self.inner.cancel_operation(kind)
    }

    /// Starts a transaction with `tpb`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached; errors reported by the
    /// library.
    pub fn start_transaction(&self, tpb: &ParameterBuffer) -> FbResult<Transaction> {
        let transaction = Transaction::new(Arc::clone(&self.inner))?;
        transaction.begin(tpb)?;
        Ok(transaction)
    }

    /// Reconnects to the limbo transaction `transaction_id`. The returned
    /// transaction is in the prepared state.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached; errors reported by the
    /// library.
    pub fn reconnect_transaction(&self, transaction_id: i64) -> FbResult<Transaction> {
        let transaction = Transaction::new(Arc::clone(&self.inner))?;
        transaction.reconnect(transaction_id)?;
        Ok(transaction)
    }

    /// Creates a statement bound to `transaction`. The native handle is
    /// allocated on first prepare.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached.
    pub fn create_statement(&self, transaction: Option<&Transaction>) -> FbResult<Statement> {
        Statement::new(Arc::clone(&self.inner), transaction.cloned())
    }

    /// Creates a blob for writing; opened by [`Blob::open`].
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached.
    pub fn create_blob_for_output(
        &self,
        transaction: &Transaction,
        bpb: Option<ParameterBuffer>,
    ) -> FbResult<Blob> {
        Blob::new(
            Arc::clone(&self.inner),
            transaction.clone(),
            IscQuad::default(),
            true,
            bpb,
        )
    }

    /// Creates a blob reading `blob_id`; opened by [`Blob::open`].
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if not attached.
    pub fn create_blob_for_input(
        &self,
        transaction: &Transaction,
        blob_id: IscQuad,
        bpb: Option<ParameterBuffer>,
    ) -> FbResult<Blob> {
        Blob::new(Arc::clone(&self.inner), transaction.clone(), blob_id, false, bpb)
    }

    /// Executes `sql` once without preparing a statement.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if not attached.
    /// * [`FbError::LimitExceeded`] if the text is too long for the
    ///   library.
    /// * Errors reported by the library.
    pub fn execute_immediate(&self, sql: &str, transaction: Option<&Transaction>) -> FbResult<()> {
        let (length, text) = statement_text(&self.inner, sql)?;
        let session = self.inner.lock_attached()?;
        let mut handle = session.handle;
        let mut tr_handle = match transaction {
            Some(transaction) => transaction.native_handle(&session)?,
            None => 0,
        };
        let mut status = StatusVector::new();
        self.inner.client.dsql_execute_immediate(
            &mut status,
            &mut handle,
            &mut tr_handle,
            length,
            &text,
            self.inner.dialect(),
            None,
        )?;
        self.inner.check(&status)
    }

    /// Creates and allocates an event handle for `event_name`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the name contains a nul byte;
    /// errors of the library.
    pub fn create_event_handle(
        &self,
        event_name: &str,
        handler: Arc<dyn EventHandler>,
    ) -> FbResult<EventHandle> {
        let encoded = self.inner.connection_encoding().encode(event_name)?;
        let name = CString::new(encoded).map_err(|_| {
            FbError::InvalidArgument(format!("event name {event_name:?} contains a nul byte"))
        })?;
        let mut handle = EventHandle::new(event_name, handler);
        handle.allocate(self.inner.client.event_block(&name)?);
        Ok(handle)
    }

    /// Queues `handle` for its next notification.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if the handle is unallocated or released
    /// or the database is not attached; errors of the library.
    pub fn queue_event(&self, handle: &mut EventHandle) -> FbResult<()> {
        let block = handle.require_block()?;
        handle.arm(&block);
        let session = self.inner.lock_attached()?;
        let mut db_handle = session.handle;
        let mut status = StatusVector::new();
        self.inner
            .client
            .que_events(&mut status, &mut db_handle, handle.event_id_mut(), &block)?;
        self.inner.check(&status)
    }

    /// Cancels the queued notification of `handle`.
    ///
    /// # Errors
    ///
    /// As [`Database::queue_event`].
    pub fn cancel_event(&self, handle: &mut EventHandle) -> FbResult<()> {
        handle.require_block()?;
        let session = self.inner.lock_attached()?;
        let mut db_handle = session.handle;
        let mut status = StatusVector::new();
        self.inner
            .client
            .cancel_events(&mut status, &mut db_handle, handle.event_id_mut())?;
        self.inner.check(&status)
    }

    /// Updates and returns the number of times the event of `handle` fired
    /// since it was last counted.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if the handle is unallocated or released.
    pub fn count_events(&self, handle: &mut EventHandle) -> FbResult<u32> {
        let block = handle.require_block()?;
        let count = self.inner.client.event_counts(&block)?;
        handle.set_event_count(count);
        Ok(count)
    }

    /// Registers a listener told about every error raised through this
    /// database.
    pub fn add_exception_listener(&self, listener: Arc<dyn ExceptionListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Removes a listener registered with
    /// [`Database::add_exception_listener`].
    pub fn remove_exception_listener(&self, listener: &Arc<dyn ExceptionListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Routes warnings to `callback` instead of the log.
    pub fn set_warning_callback(&self, callback: Option<Arc<dyn WarningCallback>>) {
        *self
            .inner
            .warning_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Sets the observer told about statement operations.
    pub fn set_operation_observer(&self, observer: Option<Arc<dyn OperationAware>>) {
        *self
            .inner
            .operation_observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = observer;
    }

    /// Number of live transactions, statements or blobs of `kind`.
    ///
    /// # Errors
    ///
    /// [`FbError::Poisoned`] if the database lock is poisoned.
    pub fn live_resources(&self, kind: ResourceKind) -> FbResult<usize> {
        Ok(self.inner.lock()?.registry.live_count(kind))
    }
}

/// Encodes `sql` and picks the length argument.
///
/// Text up to 64 KiB is sent with its length. Longer text is sent
/// nul-terminated with length `0`, which only libraries that have `fb_ping`
/// accept.
pub(crate) fn statement_text(inner: &DatabaseInner, sql: &str) -> FbResult<(u16, Vec<u8>)> {
    let mut text = inner.connection_encoding().encode(sql)?;
    if let Ok(length) = u16::try_from(text.len()) {
        return Ok((length, text));
    }
    if !inner.has_feature(ClientFeature::FbPing) {
        return Err(FbError::LimitExceeded {
            what: "statement text",
            limit: MAX_STATEMENT_LENGTH,
            actual: text.len(),
        });
    }
    if text.contains(&0) {
        return Err(FbError::InvalidArgument(
            "statement text contains a nul byte".into(),
        ));
    }
    text.push(0);
    Ok((0, text))
}
