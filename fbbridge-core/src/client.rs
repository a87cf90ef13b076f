//! The native call seam.
//!
//! [`FbClientApi`] has one method per client library entry point used by the
//! bridge. [`ClientLibrary`](crate::ffi::ClientLibrary) implements it on top
//! of a loaded `fbclient`; tests substitute an in-memory implementation.
//!
//! Every method writes its outcome to the supplied [`StatusVector`]. The
//! returned `Err` is reserved for calls that could not be issued at all
//! (disposed library, missing optional entry point, argument too large for
//! the native signature).

use std::ffi::CStr;
use std::sync::Arc;

use crate::error::FbResult;
use crate::features::ClientFeatures;
use crate::ffi::{
    BlobHandle, DbHandle, EventBlock, IscQuad, IscStatus, StatusVector, StmtHandle, SvcHandle,
    TrHandle, XsqldaBuffer,
};

/// Native calls of the Firebird client API.
pub trait FbClientApi: Send + Sync {
    /// Name of the library (for diagnostics).
    fn name(&self) -> &str;

    /// Optional entry points present in this library.
    fn features(&self) -> &ClientFeatures;

    // ── Database ────────────────────────────────────────────────────────

    /// `isc_attach_database`.
    fn attach_database(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        db: &mut DbHandle,
        dpb: &[u8],
    ) -> FbResult<()>;

    /// `isc_create_database`.
    fn create_database(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        db: &mut DbHandle,
        dpb: &[u8],
    ) -> FbResult<()>;

    /// `isc_detach_database`.
    fn detach_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()>;

    /// `isc_drop_database`.
    fn drop_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()>;

    /// `isc_database_info`.
    fn database_info(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()>;

    /// `fb_ping`.
    fn ping(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()>;

    /// `fb_cancel_operation`. Called without the database lock.
    fn cancel_operation(&self, status: &mut StatusVector, db: &mut DbHandle, kind: u16)
        -> FbResult<()>;

    // ── Transaction ─────────────────────────────────────────────────────

    /// `isc_start_multiple` with a single database.
    fn start_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        db: &mut DbHandle,
        tpb: &[u8],
    ) -> FbResult<()>;

    /// `isc_commit_transaction`.
    fn commit_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()>;

    /// `isc_commit_retaining`.
    fn commit_retaining(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()>;

    /// `isc_rollback_transaction`.
    fn rollback_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle)
        -> FbResult<()>;

    /// `isc_rollback_retaining`.
    fn rollback_retaining(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()>;

    /// `isc_prepare_transaction2`.
    fn prepare_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        message: &[u8],
    ) -> FbResult<()>;

    /// `isc_reconnect_transaction`.
    fn reconnect_transaction(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        id: &[u8],
    ) -> FbResult<()>;

    /// `isc_transaction_info`.
    fn transaction_info(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()>;

    /// `fb_disconnect_transaction`.
    fn disconnect_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle)
        -> FbResult<()>;

    // ── DSQL ────────────────────────────────────────────────────────────

    /// `isc_dsql_allocate_statement`.
    fn dsql_allocate_statement(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        stmt: &mut StmtHandle,
    ) -> FbResult<()>;

    /// `isc_dsql_prepare`. A `length` of zero means `text` is nul-terminated.
    #[allow(clippy::too_many_arguments)]
    fn dsql_prepare(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        length: u16,
        text: &[u8],
        dialect: u16,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()>;

    /// `isc_dsql_describe`.
    fn dsql_describe(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()>;

    /// `isc_dsql_describe_bind`.
    fn dsql_describe_bind(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()>;

    /// `isc_dsql_execute`.
    fn dsql_execute(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        input: &XsqldaBuffer,
    ) -> FbResult<()>;

    /// `isc_dsql_execute2`, used for singleton results.
    fn dsql_execute2(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        input: &XsqldaBuffer,
        output: &mut XsqldaBuffer,
    ) -> FbResult<()>;

    /// `isc_dsql_execute_immediate`. A `length` of zero means `text` is
    /// nul-terminated.
    #[allow(clippy::too_many_arguments)]
    fn dsql_execute_immediate(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        length: u16,
        text: &[u8],
        dialect: u16,
        input: Option<&XsqldaBuffer>,
    ) -> FbResult<()>;

    /// `isc_dsql_fetch`. Returns the fetch status (`0` row, `100` no more
    /// rows).
    fn dsql_fetch(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        output: &mut XsqldaBuffer,
    ) -> FbResult<IscStatus>;

    /// `isc_dsql_free_statement`.
    fn dsql_free_statement(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        option: u16,
    ) -> FbResult<()>;

    /// `isc_dsql_sql_info`.
    fn dsql_sql_info(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()>;

    /// `isc_dsql_set_cursor_name`.
    fn dsql_set_cursor_name(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        name: &CStr,
    ) -> FbResult<()>;

    /// `fb_dsql_set_timeout`, timeout in milliseconds (`0` disables it).
    fn dsql_set_timeout(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        timeout_ms: u32,
    ) -> FbResult<()>;

    // ── Blob ────────────────────────────────────────────────────────────

    /// `isc_create_blob2`; `id` receives the new blob id.
    fn create_blob(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        bpb: &[u8],
    ) -> FbResult<()>;

    /// `isc_open_blob2`.
    fn open_blob(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        bpb: &[u8],
    ) -> FbResult<()>;

    /// `isc_get_segment`. Returns the number of bytes written to `buffer`.
    fn get_segment(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        buffer: &mut [u8],
    ) -> FbResult<usize>;

    /// `isc_put_segment`. `data` must not exceed 65535 bytes.
    fn put_segment(&self, status: &mut StatusVector, blob: &mut BlobHandle, data: &[u8])
        -> FbResult<()>;

    /// `isc_close_blob`.
    fn close_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()>;

    /// `isc_cancel_blob`.
    fn cancel_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()>;

    /// `isc_blob_info`.
    fn blob_info(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()>;

    /// `isc_seek_blob`. Returns the new position.
    fn seek_blob(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        mode: i16,
        offset: i32,
    ) -> FbResult<i32>;

    // ── Events ──────────────────────────────────────────────────────────

    /// `isc_event_block` for a single event.
    fn event_block(&self, event_name: &CStr) -> FbResult<Arc<EventBlock>>;

    /// `isc_que_events`. Deliveries end up in [`EventBlock::deliver`].
    fn que_events(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        event_id: &mut i32,
        block: &Arc<EventBlock>,
    ) -> FbResult<()>;

    /// `isc_cancel_events`.
    fn cancel_events(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        event_id: &mut i32,
    ) -> FbResult<()>;

    /// `isc_event_counts`: count of the event since the previous call;
    /// copies the result buffer over the event buffer.
    fn event_counts(&self, block: &EventBlock) -> FbResult<u32>;

    // ── Services ────────────────────────────────────────────────────────

    /// `isc_service_attach`.
    fn service_attach(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        svc: &mut SvcHandle,
        spb: &[u8],
    ) -> FbResult<()>;

    /// `isc_service_detach`.
    fn service_detach(&self, status: &mut StatusVector, svc: &mut SvcHandle) -> FbResult<()>;

    /// `isc_service_query`.
    fn service_query(
        &self,
        status: &mut StatusVector,
        svc: &mut SvcHandle,
        send: &[u8],
        request: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()>;

    /// `isc_service_start`.
    fn service_start(&self, status: &mut StatusVector, svc: &mut SvcHandle, spb: &[u8])
        -> FbResult<()>;

    // ── Library ─────────────────────────────────────────────────────────

    /// `fb_shutdown`. Returns the library's result code.
    fn shutdown(&self, timeout_ms: u32, reason: i32) -> FbResult<i32>;
}
