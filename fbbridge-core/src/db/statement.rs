use std::collections::VecDeque;
use std::ffi::CString;
use std::sync::{Arc, Weak};
use std::time::Duration;

use strum::Display;

use super::database::{statement_text, DatabaseInner, Session};
use super::registry::{ResourceId, ResourceKind};
use super::Transaction;
use crate::consts::{
    DSQL_CLOSE, DSQL_DROP, FETCH_NO_MORE_ROWS, FETCH_OK, ISC_BAD_REQ_HANDLE, ISC_CURSOR_NOT_OPEN,
    ISC_DSQL_CURSOR_ERR,
};
use crate::error::{FbError, FbResult};
use crate::features::ClientFeature;
use crate::ffi::{StatusVector, StmtHandle, XsqldaBuffer};
use crate::fields::{RowDescriptor, RowValue};
use crate::info::{StatementType, STATEMENT_TYPE_ITEMS};
use crate::marshal;
use crate::operation::{OperationCanceller, OperationKind, OperationScope};

/// Fields described before the descriptor is grown to the reported count.
const INITIAL_DESCRIBE_VARS: usize = 10;
const STATEMENT_INFO_BUFFER: usize = 16;

/// Statement lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatementState {
    /// Created, no native handle yet.
    New,
    /// Native handle allocated.
    Allocated,
    /// Prepare in progress.
    Preparing,
    /// Prepared and ready to execute.
    Prepared,
    /// Execute in progress.
    Executing,
    /// Executed with an open cursor.
    CursorOpen,
    /// The last prepare failed; prepare again to recover.
    Error,
    /// Released.
    Closed,
}

/// What an execute produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// A cursor is open; use [`Statement::fetch_rows`].
    Cursor,
    /// One row is buffered; use [`Statement::take_row`].
    Singleton,
    /// No result set.
    NoResult,
}

fn begin_operation(db: &Arc<DatabaseInner>, kind: OperationKind) -> OperationScope {
    let weak: Weak<DatabaseInner> = Arc::downgrade(db);
    let canceller: Weak<dyn OperationCanceller> = weak;
    OperationScope::begin(kind, canceller, db.operation_observer())
}

/// A DSQL statement.
///
/// Dropping a statement that was not closed frees its handle, if the
/// attachment it was allocated on is still alive.
pub struct Statement {
    db: Arc<DatabaseInner>,
    id: ResourceId,
    state: StatementState,
    transaction: Option<Transaction>,
    statement_type: Option<StatementType>,
    parameters: RowDescriptor,
    fields: RowDescriptor,
    input: Option<XsqldaBuffer>,
    output: Option<XsqldaBuffer>,
    rows: VecDeque<RowValue>,
    all_rows_fetched: bool,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("statement_type", &self.statement_type)
            .finish_non_exhaustive()
    }
}

impl Statement {
    pub(crate) fn new(db: Arc<DatabaseInner>, transaction: Option<Transaction>) -> FbResult<Self> {
        if let Some(transaction) = &transaction {
            check_same_database(&db, transaction)?;
        }
        let id = db.lock_attached()?.registry.insert(ResourceKind::Statement);
        Ok(Self {
            db,
            id,
            state: StatementState::New,
            transaction,
            statement_type: None,
            parameters: RowDescriptor::empty(),
            fields: RowDescriptor::empty(),
            input: None,
            output: None,
            rows: VecDeque::new(),
            all_rows_fetched: false,
            timeout: None,
        })
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    /// Type of the prepared statement.
    #[must_use]
    pub const fn statement_type(&self) -> Option<StatementType> {
        self.statement_type
    }

    /// Result columns of the prepared statement.
    #[must_use]
    pub const fn fields(&self) -> &RowDescriptor {
        &self.fields
    }

    /// Parameters of the prepared statement.
    #[must_use]
    pub const fn parameters(&self) -> &RowDescriptor {
        &self.parameters
    }

    /// Native handle, `0` before allocation or after close.
    #[must_use]
    pub fn handle(&self) -> StmtHandle {
        self.db
            .lock()
            .ok()
            .and_then(|session| session.registry.handle(self.id))
            .unwrap_or(0)
    }

    /// Transaction used by prepare and execute.
    #[must_use]
    pub const fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Number of fetched rows not yet taken.
    #[must_use]
    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` once the cursor reported its last row.
    #[must_use]
    pub const fn all_rows_fetched(&self) -> bool {
        self.all_rows_fetched
    }

    /// Statement timeout, if one was set.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the statement timeout, sent with `fb_dsql_set_timeout` before
    /// every execute. Libraries without that entry point ignore it.
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if the timeout does not fit in 32 bits
    /// of milliseconds.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> FbResult<()> {
        if let Some(timeout) = timeout {
            timeout_millis(timeout)?;
        }
        self.timeout = timeout;
        Ok(())
    }

    /// Associates the statement with `transaction`.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] while a cursor is open or the statement
    ///   is closed.
    /// * [`FbError::InvalidArgument`] if the transaction belongs to another
    ///   database.
    pub fn set_transaction(&mut self, transaction: Option<Transaction>) -> FbResult<()> {
        match self.state {
            StatementState::CursorOpen | StatementState::Executing => {
                return Err(FbError::illegal_state(
                    "cannot change the transaction while a cursor is open",
                ));
            }
            StatementState::Closed => return Err(closed()),
            _ => {}
        }
        if let Some(transaction) = &transaction {
            check_same_database(&self.db, transaction)?;
        }
        self.transaction = transaction;
        Ok(())
    }

    fn require_transaction(&self) -> FbResult<Transaction> {
        self.transaction
            .clone()
            .ok_or_else(|| FbError::illegal_state("statement has no transaction"))
    }

    fn slot_handle(&self, session: &Session) -> FbResult<StmtHandle> {
        if !session.owns(self.id) {
            return Err(FbError::illegal_state_code(
                ISC_BAD_REQ_HANDLE,
                "statement belongs to a closed attachment",
            ));
        }
        Ok(session.registry.handle(self.id).unwrap_or(0))
    }

    fn allocated_handle(&self, session: &Session) -> FbResult<StmtHandle> {
        match self.slot_handle(session)? {
            0 => Err(FbError::illegal_state_code(
                ISC_BAD_REQ_HANDLE,
                "statement is not allocated",
            )),
            handle => Ok(handle),
        }
    }

    /// Prepares `sql`, allocating the native handle first if needed.
    ///
    /// Describes result columns and parameters and reads the statement
    /// type. The row buffers are reallocated only when the shape changed.
    /// An open cursor is closed first.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if the statement is closed or executing,
    ///   or has no active transaction.
    /// * [`FbError::LimitExceeded`] if the text is longer than 64 KiB and
    ///   the library cannot take nul-terminated text.
    /// * Errors reported by the library; the statement is then in the
    ///   error state.
    pub fn prepare(&mut self, sql: &str) -> FbResult<()> {
        match self.state {
            StatementState::Closed => return Err(closed()),
            StatementState::Executing | StatementState::Preparing => {
                return Err(FbError::illegal_state(format!(
                    "cannot prepare while {}",
                    self.state
                )));
            }
            StatementState::CursorOpen => self.close_cursor()?,
            _ => {}
        }
        let (length, text) = statement_text(&self.db, sql)?;
        let transaction = self.require_transaction()?;
        let db = Arc::clone(&self.db);
        let mut session = db.lock_attached()?;
        let mut tr = transaction.native_handle(&session)?;
        let mut stmt = self.slot_handle(&session)?;
        let mut status = StatusVector::new();
        if stmt == 0 {
            let mut db_handle = session.handle;
            db.client
                .dsql_allocate_statement(&mut status, &mut db_handle, &mut stmt)?;
            db.check(&status)?;
            session.registry.set_handle(self.id, stmt);
            self.state = StatementState::Allocated;
            log::trace!("allocated statement {}", self.id.get());
        }

        self.state = StatementState::Preparing;
        self.rows.clear();
        self.all_rows_fetched = false;
        let prepared = (|| -> FbResult<(RowDescriptor, RowDescriptor, StatementType)> {
            let mut probe = XsqldaBuffer::new(0)?;
            status.reset();
            db.client.dsql_prepare(
                &mut status,
                &mut tr,
                &mut stmt,
                length,
                &text,
                db.dialect(),
                &mut probe,
            )?;
            db.check(&status)?;
            let fields = describe(&db, &mut stmt, false)?;
            let parameters = describe(&db, &mut stmt, true)?;
            let statement_type = query_statement_type(&db, &mut stmt)?;
            Ok((fields, parameters, statement_type))
        })();
        drop(session);

        match prepared {
            Ok((fields, parameters, statement_type)) => {
                if self.output.is_none() || fields != self.fields {
                    self.output = Some(marshal::allocate(&fields)?);
                }
                if self.input.is_none() || parameters != self.parameters {
                    self.input = Some(marshal::allocate(&parameters)?);
                }
                log::debug!(
                    "prepared {statement_type} statement {} ({} fields, {} parameters)",
                    self.id.get(),
                    fields.count(),
                    parameters.count()
                );
                self.fields = fields;
                self.parameters = parameters;
                self.statement_type = Some(statement_type);
                self.state = StatementState::Prepared;
                Ok(())
            }
            Err(error) => {
                self.statement_type = None;
                self.state = StatementState::Error;
                Err(error)
            }
        }
    }

    /// Executes the prepared statement with `parameters`.
    ///
    /// Stored procedures that return values are executed with
    /// `isc_dsql_execute2` and their row is buffered for
    /// [`Statement::take_row`].
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] unless prepared without an open cursor.
    /// * [`FbError::InvalidArgument`] or [`FbError::LimitExceeded`] for
    ///   parameter values that do not fit.
    /// * `isc_cancelled` if the operation was cancelled before the native
    ///   call.
    /// * Errors reported by the library.
    pub fn execute(&mut self, parameters: &[Option<Vec<u8>>]) -> FbResult<ExecuteResult> {
        match self.state {
            StatementState::Prepared => {}
            StatementState::CursorOpen => {
                return Err(FbError::illegal_state_code(
                    ISC_DSQL_CURSOR_ERR,
                    "close the open cursor before executing again",
                ));
            }
            StatementState::Closed => return Err(closed()),
            state => {
                return Err(FbError::illegal_state(format!(
                    "statement is {state}, not prepared"
                )));
            }
        }
        let transaction = self.require_transaction()?;
        let coder = self.db.coder();
        let Some(input) = self.input.as_mut() else {
            return Err(FbError::illegal_state("statement has no parameter buffer"));
        };
        marshal::encode_row(input, &self.parameters, parameters, coder.as_ref())?;

        let db = Arc::clone(&self.db);
        let singleton = self.statement_type == Some(StatementType::ExecProcedure)
            && !self.fields.is_empty();
        let cursor = self.statement_type.is_some_and(StatementType::opens_cursor)
            && !self.fields.is_empty();
        let timeout = self
            .timeout
            .filter(|_| db.has_feature(ClientFeature::StatementTimeout));

        let scope = begin_operation(&db, OperationKind::Execute);
        let session = db.lock_attached()?;
        let mut tr = transaction.native_handle(&session)?;
        let mut stmt = self.allocated_handle(&session)?;
        self.rows.clear();
        self.all_rows_fetched = false;
        self.state = StatementState::Executing;

        let executed = (|| -> FbResult<ExecuteResult> {
            let mut status = StatusVector::new();
            if let Some(timeout) = timeout {
                db.client
                    .dsql_set_timeout(&mut status, &mut stmt, timeout_millis(timeout)?)?;
                db.check(&status)?;
                status.reset();
            }
            scope.enter_native_call().map_err(|error| db.notify(error))?;
            let (Some(input), Some(output)) = (self.input.as_ref(), self.output.as_mut()) else {
                return Err(FbError::illegal_state("statement buffers are missing"));
            };
            if singleton {
                db.client
                    .dsql_execute2(&mut status, &mut tr, &mut stmt, input, output)?;
                db.check(&status)?;
                let row = marshal::decode_row(output, &self.fields, coder.as_ref())?;
                self.rows.push_back(row);
                self.all_rows_fetched = true;
                Ok(ExecuteResult::Singleton)
            } else {
                db.client
                    .dsql_execute(&mut status, &mut tr, &mut stmt, input)?;
                db.check(&status)?;
                Ok(if cursor {
                    ExecuteResult::Cursor
                } else {
                    ExecuteResult::NoResult
                })
            }
        })();
        drop(session);
        drop(scope);

        self.state = match executed {
            Ok(ExecuteResult::Cursor) => StatementState::CursorOpen,
            _ => StatementState::Prepared,
        };
        executed
    }

    /// Fetches up to `max_rows` rows (at least one) into the row buffer.
    /// Returns the number of rows fetched; `0` once the cursor is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] without an open cursor.
    /// * `isc_cancelled` if the operation was cancelled before the native
    ///   call.
    /// * Errors reported by the library.
    pub fn fetch_rows(&mut self, max_rows: usize) -> FbResult<usize> {
        if self.state != StatementState::CursorOpen {
            return Err(FbError::illegal_state_code(
                ISC_CURSOR_NOT_OPEN,
                "statement has no open cursor",
            ));
        }
        if self.all_rows_fetched {
            return Ok(0);
        }
        let db = Arc::clone(&self.db);
        let coder = db.coder();
        let scope = begin_operation(&db, OperationKind::Fetch);
        let session = db.lock_attached()?;
        let mut stmt = self.allocated_handle(&session)?;
        scope.enter_native_call().map_err(|error| db.notify(error))?;
        let Some(output) = self.output.as_mut() else {
            return Err(FbError::illegal_state("statement has no row buffer"));
        };
        let mut status = StatusVector::new();
        let mut fetched = 0;
        while fetched < max_rows.max(1) {
            status.reset();
            let code = db.client.dsql_fetch(&mut status, &mut stmt, output)?;
            db.check(&status)?;
            match code {
                FETCH_OK => {
                    let row = marshal::decode_row(output, &self.fields, coder.as_ref())?;
                    self.rows.push_back(row);
                    fetched += 1;
                }
                FETCH_NO_MORE_ROWS => {
                    self.all_rows_fetched = true;
                    break;
                }
                other => {
                    return Err(FbError::illegal_state(format!(
                        "unexpected fetch status {other}"
                    )));
                }
            }
        }
        log::trace!("fetched {fetched} rows for statement {}", self.id.get());
        Ok(fetched)
    }

    /// Takes the next buffered row.
    pub fn take_row(&mut self) -> Option<RowValue> {
        self.rows.pop_front()
    }

    /// Closes the open cursor and keeps the statement prepared. Does
    /// nothing without an open cursor.
    ///
    /// # Errors
    ///
    /// Errors reported by the library.
    pub fn close_cursor(&mut self) -> FbResult<()> {
        if self.state != StatementState::CursorOpen {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        let session = db.lock()?;
        if session.owns(self.id) {
            let mut stmt = self.allocated_handle(&session)?;
            let mut status = StatusVector::new();
            db.client
                .dsql_free_statement(&mut status, &mut stmt, DSQL_CLOSE)?;
            db.check_expecting(&status, &[ISC_DSQL_CURSOR_ERR, ISC_CURSOR_NOT_OPEN])?;
        }
        self.rows.clear();
        self.all_rows_fetched = false;
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Sets the cursor name used by positioned updates.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] unless prepared.
    /// * [`FbError::InvalidArgument`] if `name` contains a nul byte.
    /// * Errors reported by the library.
    pub fn set_cursor_name(&mut self, name: &str) -> FbResult<()> {
        if self.state != StatementState::Prepared {
            return Err(FbError::illegal_state(format!(
                "statement is {}, not prepared",
                self.state
            )));
        }
        let encoded = self.db.connection_encoding().encode(name)?;
        let name = CString::new(encoded)
            .map_err(|_| FbError::InvalidArgument("cursor name contains a nul byte".into()))?;
        let db = Arc::clone(&self.db);
        let session = db.lock_attached()?;
        let mut stmt = self.allocated_handle(&session)?;
        let mut status = StatusVector::new();
        db.client
            .dsql_set_cursor_name(&mut status, &mut stmt, &name)?;
        db.check(&status)
    }

    /// Raw `isc_dsql_sql_info` response for `items`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] if the statement is not allocated; errors
    /// reported by the library.
    pub fn sql_info(&self, items: &[u8], buffer_length: usize) -> FbResult<Vec<u8>> {
        let session = self.db.lock_attached()?;
        let mut stmt = self.allocated_handle(&session)?;
        let mut status = StatusVector::new();
        let mut buffer = vec![0; buffer_length];
        self.db
            .client
            .dsql_sql_info(&mut status, &mut stmt, items, &mut buffer)?;
        self.db.check(&status)?;
        Ok(buffer)
    }

    /// Frees the native statement. Closing a closed statement does nothing.
    ///
    /// # Errors
    ///
    /// Errors reported by the library; the statement stays open.
    pub fn close(&mut self) -> FbResult<()> {
        if self.state == StatementState::Closed {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        let mut session = db.lock()?;
        if session.owns(self.id) {
            let mut stmt = session.registry.handle(self.id).unwrap_or(0);
            if stmt != 0 {
                let mut status = StatusVector::new();
                db.client
                    .dsql_free_statement(&mut status, &mut stmt, DSQL_DROP)?;
                db.check(&status)?;
            }
        }
        session.registry.remove(self.id);
        drop(session);
        self.release_buffers();
        log::trace!("closed statement {}", self.id.get());
        Ok(())
    }

    fn release_buffers(&mut self) {
        self.state = StatementState::Closed;
        self.rows.clear();
        self.input = None;
        self.output = None;
        self.transaction = None;
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if self.state == StatementState::Closed {
            return;
        }
        let Ok(mut session) = self.db.lock() else {
            return;
        };
        let current = session.owns(self.id);
        let handle = session.registry.remove(self.id).unwrap_or(0);
        if current && handle != 0 {
            let mut stmt = handle;
            let mut status = StatusVector::new();
            if let Err(error) = self
                .db
                .client
                .dsql_free_statement(&mut status, &mut stmt, DSQL_DROP)
            {
                log::debug!("freeing statement {} failed: {error}", self.id.get());
            }
        }
    }
}

fn closed() -> FbError {
    FbError::illegal_state_code(ISC_BAD_REQ_HANDLE, "statement is closed")
}

fn check_same_database(db: &Arc<DatabaseInner>, transaction: &Transaction) -> FbResult<()> {
    if transaction.belongs_to(db) {
        Ok(())
    } else {
        Err(FbError::InvalidArgument(
            "transaction belongs to another database".into(),
        ))
    }
}

fn timeout_millis(timeout: Duration) -> FbResult<u32> {
    u32::try_from(timeout.as_millis()).map_err(|_| FbError::LimitExceeded {
        what: "statement timeout in milliseconds",
        limit: u32::MAX as usize,
        actual: usize::try_from(timeout.as_millis()).unwrap_or(usize::MAX),
    })
}

/// Runs describe or describe-bind, growing the descriptor once if the
/// library reports more fields than fit.
fn describe(db: &DatabaseInner, stmt: &mut StmtHandle, bind: bool) -> FbResult<RowDescriptor> {
    let mut sqlda = XsqldaBuffer::new(INITIAL_DESCRIBE_VARS)?;
    let mut status = StatusVector::new();
    let mut run = |sqlda: &mut XsqldaBuffer| -> FbResult<()> {
        status.reset();
        if bind {
            db.client.dsql_describe_bind(&mut status, stmt, sqlda)?;
        } else {
            db.client.dsql_describe(&mut status, stmt, sqlda)?;
        }
        db.check(&status)
    };
    run(&mut sqlda)?;
    if sqlda.described_count() > sqlda.capacity() {
        sqlda = XsqldaBuffer::new(sqlda.described_count())?;
        run(&mut sqlda)?;
    }
    Ok(marshal::describe(&sqlda, db.connection_encoding()))
}

fn query_statement_type(db: &DatabaseInner, stmt: &mut StmtHandle) -> FbResult<StatementType> {
    let mut status = StatusVector::new();
    let mut buffer = [0; STATEMENT_INFO_BUFFER];
    db.client
        .dsql_sql_info(&mut status, stmt, STATEMENT_TYPE_ITEMS, &mut buffer)?;
    db.check(&status)?;
    StatementType::parse(&buffer)
}
