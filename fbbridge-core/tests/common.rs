#![allow(dead_code)]

//! Common test utilities shared across integration tests.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fbbridge_core::consts::{
    DSQL_DROP, FETCH_NO_MORE_ROWS, FETCH_OK, ISC_INFO_BLOB_MAX_SEGMENT,
    ISC_INFO_BLOB_NUM_SEGMENTS, ISC_INFO_BLOB_TOTAL_LENGTH, ISC_INFO_BLOB_TYPE,
    ISC_INFO_DB_SQL_DIALECT, ISC_INFO_END, ISC_INFO_ODS_MINOR_VERSION, ISC_INFO_ODS_VERSION,
    ISC_INFO_SQL_STMT_DDL, ISC_INFO_SQL_STMT_EXEC_PROCEDURE, ISC_INFO_SQL_STMT_INSERT,
    ISC_INFO_SQL_STMT_SELECT, ISC_INFO_SQL_STMT_TYPE, ISC_INFO_TRA_ID, ISC_SEGMENT,
    ISC_SEGSTR_EOF, SQL_LONG, SQL_VARYING,
};
use fbbridge_core::ffi::{
    event_buffer, event_count_delta, BlobHandle, DbHandle, EventBlock, IscQuad, IscStatus,
    SqlVar, StatusArg, StatusVector, StmtHandle, SvcHandle, TrHandle, XsqldaBuffer,
};
use fbbridge_core::{
    ClientFeature, ClientFeatures, ConnectionProperties, Database, DatabaseFactory, FactoryKind,
    FbClientApi, FbResult,
};

/// Statement answered with three `INTEGER` rows (1, 2, 3).
pub const SELECT_IDS: &str = "SELECT ID FROM T";
/// Statement described with twelve `INTEGER` columns and one row.
pub const SELECT_WIDE: &str = "SELECT WIDE FROM T";
/// Procedure echoing its `VARCHAR(20)` parameter.
pub const EXECUTE_ECHO: &str = "EXECUTE PROCEDURE ECHO(?)";
/// Statement without result set.
pub const INSERT_ROW: &str = "INSERT INTO T VALUES (1)";

const WIDE_COLUMNS: usize = 12;
const ECHO_LENGTH: i16 = 20;

#[derive(Default)]
struct FakeStatement {
    sql: String,
    rows: Vec<i32>,
}

struct FakeBlob {
    blob_id: u64,
    segment: usize,
    offset: usize,
}

struct QueuedEvent {
    id: i32,
    name: Vec<u8>,
    block: Arc<EventBlock>,
}

#[derive(Default)]
struct FakeState {
    next_handle: u32,
    next_blob_id: u64,
    next_event_id: i32,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, i32>,
    warnings: HashMap<&'static str, i32>,
    statements: HashMap<StmtHandle, FakeStatement>,
    stored_blobs: HashMap<u64, Vec<Vec<u8>>>,
    open_blobs: HashMap<BlobHandle, FakeBlob>,
    queued: Vec<QueuedEvent>,
    posted: HashMap<Vec<u8>, u32>,
    prepared: Vec<(u16, Vec<u8>)>,
    timeouts: Vec<u32>,
    cancels: Vec<u16>,
    hooks: HashMap<&'static str, Box<dyn FnOnce() + Send>>,
}

impl FakeState {
    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// In-memory stand-in for `fbclient`.
pub struct FakeClient {
    features: ClientFeatures,
    state: Mutex<FakeState>,
}

impl FakeClient {
    pub fn new(features: impl IntoIterator<Item = ClientFeature>) -> Arc<Self> {
        Arc::new(Self {
            features: features.into_iter().collect(),
            state: Mutex::new(FakeState::default()),
        })
    }

    pub fn with_all_features() -> Arc<Self> {
        Self::new(ClientFeature::all())
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call`; returns `true` if it was told to fail, in which case
    /// the status vector holds the error.
    fn enter(&self, call: &'static str, status: &mut StatusVector) -> bool {
        let hook = {
            let mut state = self.lock();
            state.calls.push(call);
            state.hooks.remove(call)
        };
        // runs without the state lock so it can call back into the client
        if let Some(hook) = hook {
            hook();
        }
        let mut state = self.lock();
        if let Some(code) = state.failures.remove(call) {
            status.load(&[StatusArg::Gds(code)]);
            return true;
        }
        if let Some(code) = state.warnings.remove(call) {
            status.load(&[StatusArg::Gds(0), StatusArg::Warning(code)]);
        }
        false
    }

    /// Runs `hook` inside the next `call`, before it completes.
    pub fn during_next(&self, call: &'static str, hook: impl FnOnce() + Send + 'static) {
        self.lock().hooks.insert(call, Box::new(hook));
    }

    /// Makes the next `call` report `code` through the status vector.
    pub fn fail_next(&self, call: &'static str, code: i32) {
        self.lock().failures.insert(call, code);
    }

    /// Makes the next `call` succeed with warning `code`.
    pub fn warn_next(&self, call: &'static str, code: i32) {
        self.lock().warnings.insert(call, code);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Length argument and text of every `isc_dsql_prepare`.
    pub fn prepared(&self) -> Vec<(u16, Vec<u8>)> {
        self.lock().prepared.clone()
    }

    pub fn timeouts(&self) -> Vec<u32> {
        self.lock().timeouts.clone()
    }

    pub fn cancels(&self) -> Vec<u16> {
        self.lock().cancels.clone()
    }

    /// Segments stored for `blob_id`.
    pub fn blob_segments(&self, blob_id: IscQuad) -> Option<Vec<Vec<u8>>> {
        self.lock().stored_blobs.get(&blob_id.to_u64()).cloned()
    }

    /// Stores a blob made of `segments` and returns its id.
    pub fn store_blob(&self, segments: &[&[u8]]) -> IscQuad {
        let mut state = self.lock();
        state.next_blob_id += 1;
        let id = state.next_blob_id;
        state
            .stored_blobs
            .insert(id, segments.iter().map(|s| s.to_vec()).collect());
        IscQuad::from_u64(id)
    }

    pub fn queued_events(&self) -> usize {
        self.lock().queued.len()
    }

    /// Posts `name` `times` times and delivers it to every queued
    /// registration, which is then dequeued.
    pub fn post_event(&self, name: &str, times: u32) {
        let name = name.as_bytes().to_vec();
        let (count, blocks) = {
            let mut state = self.lock();
            let count = {
                let counter = state.posted.entry(name.clone()).or_default();
                *counter += times;
                *counter
            };
            let (matching, rest) = std::mem::take(&mut state.queued)
                .into_iter()
                .partition::<Vec<_>, _>(|queued| queued.name == name);
            state.queued = rest;
            (count, matching)
        };
        let mut updated = event_buffer(&name);
        let length = updated.len();
        updated[length - 4..].copy_from_slice(&count.to_le_bytes());
        for queued in blocks {
            queued.block.deliver(&updated);
        }
    }
}

fn write_info(buffer: &mut [u8], items: &[(u8, Vec<u8>)]) {
    let mut response = Vec::new();
    for (tag, value) in items {
        response.push(*tag);
        response.extend_from_slice(&(value.len() as u16).to_le_bytes());
        response.extend_from_slice(value);
    }
    response.push(ISC_INFO_END);
    let length = response.len().min(buffer.len());
    buffer[..length].copy_from_slice(&response[..length]);
}

fn statement_type(sql: &str) -> i32 {
    if sql.starts_with("SELECT") {
        ISC_INFO_SQL_STMT_SELECT
    } else if sql.starts_with("EXECUTE PROCEDURE") {
        ISC_INFO_SQL_STMT_EXEC_PROCEDURE
    } else if sql.starts_with("INSERT") {
        ISC_INFO_SQL_STMT_INSERT
    } else {
        ISC_INFO_SQL_STMT_DDL
    }
}

fn integer_var(name: &str) -> SqlVar {
    SqlVar {
        sqltype: (SQL_LONG | 1) as i16,
        sqllen: 4,
        field_name: name.as_bytes().to_vec(),
        alias_name: name.as_bytes().to_vec(),
        ..SqlVar::default()
    }
}

fn varchar_var(name: &str) -> SqlVar {
    SqlVar {
        sqltype: (SQL_VARYING | 1) as i16,
        sqllen: ECHO_LENGTH,
        field_name: name.as_bytes().to_vec(),
        ..SqlVar::default()
    }
}

fn fill(sqlda: &mut XsqldaBuffer, vars: &[SqlVar]) {
    sqlda.set_described_count(vars.len());
    for (index, var) in vars.iter().enumerate().take(sqlda.capacity()) {
        sqlda.set_var(index, var);
    }
}

impl FbClientApi for FakeClient {
    fn name(&self) -> &str {
        "fake"
    }

    fn features(&self) -> &ClientFeatures {
        &self.features
    }

    fn attach_database(
        &self,
        status: &mut StatusVector,
        _name: &[u8],
        db: &mut DbHandle,
        _dpb: &[u8],
    ) -> FbResult<()> {
        if !self.enter("attach_database", status) {
            *db = self.lock().allocate();
        }
        Ok(())
    }

    fn create_database(
        &self,
        status: &mut StatusVector,
        _name: &[u8],
        db: &mut DbHandle,
        _dpb: &[u8],
    ) -> FbResult<()> {
        if !self.enter("create_database", status) {
            *db = self.lock().allocate();
        }
        Ok(())
    }

    fn detach_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()> {
        if !self.enter("detach_database", status) {
            *db = 0;
        }
        Ok(())
    }

    fn drop_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()> {
        if !self.enter("drop_database", status) {
            *db = 0;
        }
        Ok(())
    }

    fn database_info(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        _items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        if !self.enter("database_info", status) {
            write_info(
                buffer,
                &[
                    (ISC_INFO_ODS_VERSION, 13_i32.to_le_bytes().to_vec()),
                    (ISC_INFO_ODS_MINOR_VERSION, 1_i32.to_le_bytes().to_vec()),
                    (ISC_INFO_DB_SQL_DIALECT, vec![3]),
                ],
            );
        }
        Ok(())
    }

    fn ping(&self, status: &mut StatusVector, _db: &mut DbHandle) -> FbResult<()> {
        self.enter("ping", status);
        Ok(())
    }

    fn cancel_operation(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        kind: u16,
    ) -> FbResult<()> {
        if !self.enter("cancel_operation", status) {
            self.lock().cancels.push(kind);
        }
        Ok(())
    }

    fn start_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        _db: &mut DbHandle,
        _tpb: &[u8],
    ) -> FbResult<()> {
        if !self.enter("start_transaction", status) {
            *tr = self.lock().allocate();
        }
        Ok(())
    }

    fn commit_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        if !self.enter("commit_transaction", status) {
            *tr = 0;
        }
        Ok(())
    }

    fn commit_retaining(&self, status: &mut StatusVector, _tr: &mut TrHandle) -> FbResult<()> {
        self.enter("commit_retaining", status);
        Ok(())
    }

    fn rollback_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
    ) -> FbResult<()> {
        if !self.enter("rollback_transaction", status) {
            *tr = 0;
        }
        Ok(())
    }

    fn rollback_retaining(&self, status: &mut StatusVector, _tr: &mut TrHandle) -> FbResult<()> {
        self.enter("rollback_retaining", status);
        Ok(())
    }

    fn prepare_transaction(
        &self,
        status: &mut StatusVector,
        _tr: &mut TrHandle,
        _message: &[u8],
    ) -> FbResult<()> {
        self.enter("prepare_transaction", status);
        Ok(())
    }

    fn reconnect_transaction(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        tr: &mut TrHandle,
        _id: &[u8],
    ) -> FbResult<()> {
        if !self.enter("reconnect_transaction", status) {
            *tr = self.lock().allocate();
        }
        Ok(())
    }

    fn transaction_info(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        _items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        if !self.enter("transaction_info", status) {
            write_info(buffer, &[(ISC_INFO_TRA_ID, (*tr).to_le_bytes().to_vec())]);
        }
        Ok(())
    }

    fn disconnect_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
    ) -> FbResult<()> {
        if !self.enter("disconnect_transaction", status) {
            *tr = 0;
        }
        Ok(())
    }

    fn dsql_allocate_statement(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        stmt: &mut StmtHandle,
    ) -> FbResult<()> {
        if !self.enter("dsql_allocate_statement", status) {
            let mut state = self.lock();
            *stmt = state.allocate();
            state.statements.insert(*stmt, FakeStatement::default());
        }
        Ok(())
    }

    fn dsql_prepare(
        &self,
        status: &mut StatusVector,
        _tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        length: u16,
        text: &[u8],
        _dialect: u16,
        _sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        if self.enter("dsql_prepare", status) {
            return Ok(());
        }
        let mut state = self.lock();
        state.prepared.push((length, text.to_vec()));
        let sql = String::from_utf8_lossy(text).trim_end_matches('\0').to_string();
        if let Some(statement) = state.statements.get_mut(stmt) {
            statement.sql = sql;
            statement.rows.clear();
        }
        Ok(())
    }

    fn dsql_describe(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        if self.enter("dsql_describe", status) {
            return Ok(());
        }
        let sql = self
            .lock()
            .statements
            .get(stmt)
            .map(|s| s.sql.clone())
            .unwrap_or_default();
        let vars: Vec<SqlVar> = if sql == SELECT_WIDE {
            (0..WIDE_COLUMNS)
                .map(|i| integer_var(&format!("C{i}")))
                .collect()
        } else if sql.starts_with("SELECT") {
            vec![integer_var("ID")]
        } else if sql == EXECUTE_ECHO {
            vec![varchar_var("RESULT")]
        } else {
            Vec::new()
        };
        fill(sqlda, &vars);
        Ok(())
    }

    fn dsql_describe_bind(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        if self.enter("dsql_describe_bind", status) {
            return Ok(());
        }
        let sql = self
            .lock()
            .statements
            .get(stmt)
            .map(|s| s.sql.clone())
            .unwrap_or_default();
        let vars = if sql == EXECUTE_ECHO {
            vec![varchar_var("VALUE")]
        } else {
            Vec::new()
        };
        fill(sqlda, &vars);
        Ok(())
    }

    fn dsql_execute(
        &self,
        status: &mut StatusVector,
        _tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        _input: &XsqldaBuffer,
    ) -> FbResult<()> {
        if self.enter("dsql_execute", status) {
            return Ok(());
        }
        let mut state = self.lock();
        if let Some(statement) = state.statements.get_mut(stmt) {
            statement.rows = if statement.sql == SELECT_WIDE {
                vec![7]
            } else if statement.sql.starts_with("SELECT") {
                vec![1, 2, 3]
            } else {
                Vec::new()
            };
            statement.rows.reverse();
        }
        Ok(())
    }

    fn dsql_execute2(
        &self,
        status: &mut StatusVector,
        _tr: &mut TrHandle,
        _stmt: &mut StmtHandle,
        input: &XsqldaBuffer,
        output: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        if self.enter("dsql_execute2", status) {
            return Ok(());
        }
        let value = input.data(0).to_vec();
        let target = output.data_mut(0);
        let length = value.len().min(target.len());
        target[..length].copy_from_slice(&value[..length]);
        output.set_indicator(0, input.indicator(0).unwrap_or(-1));
        Ok(())
    }

    fn dsql_execute_immediate(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        _tr: &mut TrHandle,
        length: u16,
        text: &[u8],
        _dialect: u16,
        _input: Option<&XsqldaBuffer>,
    ) -> FbResult<()> {
        if !self.enter("dsql_execute_immediate", status) {
            self.lock().prepared.push((length, text.to_vec()));
        }
        Ok(())
    }

    fn dsql_fetch(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        output: &mut XsqldaBuffer,
    ) -> FbResult<IscStatus> {
        if self.enter("dsql_fetch", status) {
            return Ok(0);
        }
        let next = self
            .lock()
            .statements
            .get_mut(stmt)
            .and_then(|statement| statement.rows.pop());
        let Some(value) = next else {
            return Ok(FETCH_NO_MORE_ROWS);
        };
        for index in 0..output.capacity() {
            output.data_mut(index)[..4].copy_from_slice(&value.to_ne_bytes());
            output.set_indicator(index, 0);
        }
        Ok(FETCH_OK)
    }

    fn dsql_free_statement(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        option: u16,
    ) -> FbResult<()> {
        let call = if option == DSQL_DROP {
            "dsql_free_statement(drop)"
        } else {
            "dsql_free_statement(close)"
        };
        if self.enter(call, status) {
            return Ok(());
        }
        let mut state = self.lock();
        if option == DSQL_DROP {
            state.statements.remove(stmt);
            *stmt = 0;
        } else if let Some(statement) = state.statements.get_mut(stmt) {
            statement.rows.clear();
        }
        Ok(())
    }

    fn dsql_sql_info(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        _items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        if self.enter("dsql_sql_info", status) {
            return Ok(());
        }
        let sql = self
            .lock()
            .statements
            .get(stmt)
            .map(|s| s.sql.clone())
            .unwrap_or_default();
        write_info(
            buffer,
            &[(
                ISC_INFO_SQL_STMT_TYPE,
                statement_type(&sql).to_le_bytes().to_vec(),
            )],
        );
        Ok(())
    }

    fn dsql_set_cursor_name(
        &self,
        status: &mut StatusVector,
        _stmt: &mut StmtHandle,
        _name: &CStr,
    ) -> FbResult<()> {
        self.enter("dsql_set_cursor_name", status);
        Ok(())
    }

    fn dsql_set_timeout(
        &self,
        status: &mut StatusVector,
        _stmt: &mut StmtHandle,
        timeout_ms: u32,
    ) -> FbResult<()> {
        if !self.enter("dsql_set_timeout", status) {
            self.lock().timeouts.push(timeout_ms);
        }
        Ok(())
    }

    fn create_blob(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        _tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        _bpb: &[u8],
    ) -> FbResult<()> {
        if self.enter("create_blob", status) {
            return Ok(());
        }
        let mut state = self.lock();
        state.next_blob_id += 1;
        let blob_id = state.next_blob_id;
        state.stored_blobs.insert(blob_id, Vec::new());
        *blob = state.allocate();
        state.open_blobs.insert(
            *blob,
            FakeBlob {
                blob_id,
                segment: 0,
                offset: 0,
            },
        );
        *id = IscQuad::from_u64(blob_id);
        Ok(())
    }

    fn open_blob(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        _tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        _bpb: &[u8],
    ) -> FbResult<()> {
        if self.enter("open_blob", status) {
            return Ok(());
        }
        let mut state = self.lock();
        *blob = state.allocate();
        state.open_blobs.insert(
            *blob,
            FakeBlob {
                blob_id: id.to_u64(),
                segment: 0,
                offset: 0,
            },
        );
        Ok(())
    }

    fn get_segment(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        buffer: &mut [u8],
    ) -> FbResult<usize> {
        if self.enter("get_segment", status) {
            return Ok(0);
        }
        let mut state = self.lock();
        let FakeState {
            open_blobs,
            stored_blobs,
            ..
        } = &mut *state;
        let Some(open) = open_blobs.get_mut(blob) else {
            return Ok(0);
        };
        let segments = stored_blobs.get(&open.blob_id).cloned().unwrap_or_default();
        let Some(segment) = segments.get(open.segment) else {
            status.load(&[StatusArg::Gds(ISC_SEGSTR_EOF)]);
            return Ok(0);
        };
        let remaining = &segment[open.offset..];
        let length = remaining.len().min(buffer.len());
        buffer[..length].copy_from_slice(&remaining[..length]);
        if length < remaining.len() {
            open.offset += length;
            status.load(&[StatusArg::Gds(ISC_SEGMENT)]);
        } else {
            open.segment += 1;
            open.offset = 0;
        }
        Ok(length)
    }

    fn put_segment(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        data: &[u8],
    ) -> FbResult<()> {
        if self.enter("put_segment", status) {
            return Ok(());
        }
        let mut state = self.lock();
        let Some(blob_id) = state.open_blobs.get(blob).map(|open| open.blob_id) else {
            return Ok(());
        };
        state
            .stored_blobs
            .entry(blob_id)
            .or_default()
            .push(data.to_vec());
        Ok(())
    }

    fn close_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()> {
        if !self.enter("close_blob", status) {
            self.lock().open_blobs.remove(blob);
            *blob = 0;
        }
        Ok(())
    }

    fn cancel_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()> {
        if !self.enter("cancel_blob", status) {
            let mut state = self.lock();
            if let Some(open) = state.open_blobs.remove(blob) {
                state.stored_blobs.remove(&open.blob_id);
            }
            *blob = 0;
        }
        Ok(())
    }

    fn blob_info(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        _items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        if self.enter("blob_info", status) {
            return Ok(());
        }
        let state = self.lock();
        let segments = state
            .open_blobs
            .get(blob)
            .and_then(|open| state.stored_blobs.get(&open.blob_id))
            .cloned()
            .unwrap_or_default();
        let int = |value: usize| (value as i32).to_le_bytes().to_vec();
        write_info(
            buffer,
            &[
                (ISC_INFO_BLOB_NUM_SEGMENTS, int(segments.len())),
                (
                    ISC_INFO_BLOB_MAX_SEGMENT,
                    int(segments.iter().map(Vec::len).max().unwrap_or(0)),
                ),
                (
                    ISC_INFO_BLOB_TOTAL_LENGTH,
                    int(segments.iter().map(Vec::len).sum()),
                ),
                (ISC_INFO_BLOB_TYPE, vec![0]),
            ],
        );
        Ok(())
    }

    fn seek_blob(
        &self,
        status: &mut StatusVector,
        _blob: &mut BlobHandle,
        _mode: i16,
        offset: i32,
    ) -> FbResult<i32> {
        self.enter("seek_blob", status);
        Ok(offset)
    }

    fn event_block(&self, event_name: &CStr) -> FbResult<Arc<EventBlock>> {
        self.lock().calls.push("event_block");
        Ok(Arc::new(EventBlock::owned(event_name.to_bytes())))
    }

    fn que_events(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        event_id: &mut i32,
        block: &Arc<EventBlock>,
    ) -> FbResult<()> {
        if self.enter("que_events", status) {
            return Ok(());
        }
        let name = block
            .with_buffers(|event, _| {
                let length = usize::from(event[1]);
                event[2..2 + length].to_vec()
            })
            .unwrap_or_default();
        let mut state = self.lock();
        state.next_event_id += 1;
        *event_id = state.next_event_id;
        let id = *event_id;
        state.queued.push(QueuedEvent {
            id,
            name,
            block: Arc::clone(block),
        });
        Ok(())
    }

    fn cancel_events(
        &self,
        status: &mut StatusVector,
        _db: &mut DbHandle,
        event_id: &mut i32,
    ) -> FbResult<()> {
        if !self.enter("cancel_events", status) {
            let id = *event_id;
            self.lock().queued.retain(|queued| queued.id != id);
        }
        Ok(())
    }

    fn event_counts(&self, block: &EventBlock) -> FbResult<u32> {
        self.lock().calls.push("event_counts");
        Ok(block
            .with_buffers(|event, result| {
                let delta = event_count_delta(event, result);
                event.copy_from_slice(result);
                delta
            })
            .unwrap_or(0))
    }

    fn service_attach(
        &self,
        status: &mut StatusVector,
        _name: &[u8],
        svc: &mut SvcHandle,
        _spb: &[u8],
    ) -> FbResult<()> {
        if !self.enter("service_attach", status) {
            *svc = self.lock().allocate();
        }
        Ok(())
    }

    fn service_detach(&self, status: &mut StatusVector, svc: &mut SvcHandle) -> FbResult<()> {
        if !self.enter("service_detach", status) {
            *svc = 0;
        }
        Ok(())
    }

    fn service_query(
        &self,
        status: &mut StatusVector,
        _svc: &mut SvcHandle,
        _send: &[u8],
        request: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        if !self.enter("service_query", status) {
            let length = request.len().min(buffer.len());
            buffer[..length].copy_from_slice(&request[..length]);
        }
        Ok(())
    }

    fn service_start(
        &self,
        status: &mut StatusVector,
        _svc: &mut SvcHandle,
        _spb: &[u8],
    ) -> FbResult<()> {
        self.enter("service_start", status);
        Ok(())
    }

    fn shutdown(&self, _timeout_ms: u32, _reason: i32) -> FbResult<i32> {
        self.lock().calls.push("shutdown");
        Ok(0)
    }
}

/// Unattached database over `client`, built through a client factory.
pub fn database(client: &Arc<FakeClient>) -> Database {
    database_with(client, ConnectionProperties::new("employee").with_server("localhost", 3050))
}

pub fn database_with(client: &Arc<FakeClient>, properties: ConnectionProperties) -> Database {
    let api: Arc<dyn FbClientApi> = client.clone();
    DatabaseFactory::with_client(FactoryKind::Client, api)
        .connect(properties)
        .expect("connect")
}

/// Attached database over `client`.
pub fn attached(client: &Arc<FakeClient>) -> Database {
    let db = database(client);
    db.attach().expect("attach");
    db
}
