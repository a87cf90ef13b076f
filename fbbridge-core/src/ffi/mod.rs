//! Raw native surface of the Firebird client library.
//!
//! The `ffi` module is the only module of the crate that contains unsafe
//! code. Everything it hands out (status vectors, XSQLDA buffers, event
//! blocks) is safe to use from the rest of the crate.
//!
//! Handles are `FB_API_HANDLE` values (`unsigned int`); status vector
//! elements are `ISC_STATUS` (`intptr_t`).

#![allow(non_camel_case_types, non_snake_case, clippy::upper_case_acronyms)]

use std::os::raw::{c_char, c_int, c_short, c_uint, c_ushort, c_void};

pub mod library;
pub mod memory;
pub mod xsqlda;

pub use library::ClientLibrary;
pub use memory::{event_buffer, event_count_delta, EventBlock, StatusArg, StatusVector};
pub use xsqlda::{SqlVar, XsqldaBuffer};

/// Element of a status vector.
pub type IscStatus = isize;
/// Opaque native handle (`FB_API_HANDLE`).
pub type ApiHandle = u32;
/// Database attachment handle.
pub type DbHandle = ApiHandle;
/// Transaction handle.
pub type TrHandle = ApiHandle;
/// Statement handle.
pub type StmtHandle = ApiHandle;
/// Blob handle.
pub type BlobHandle = ApiHandle;
/// Service manager handle.
pub type SvcHandle = ApiHandle;

/// Number of elements in a status vector.
pub const STATUS_VECTOR_SIZE: usize = 20;

/// Blob id (`ISC_QUAD`) as an opaque 64-bit value; zero means "no id".
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IscQuad {
    /// High word.
    pub gds_quad_high: i32,
    /// Low word.
    pub gds_quad_low: u32,
}

impl IscQuad {
    /// The null blob id.
    pub const NULL: Self = Self {
        gds_quad_high: 0,
        gds_quad_low: 0,
    };

    /// Returns `true` for the null id.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.gds_quad_high == 0 && self.gds_quad_low == 0
    }

    /// Packs the id into a `u64` (high word first).
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        ((self.gds_quad_high as u32 as u64) << 32) | self.gds_quad_low as u64
    }

    /// Unpacks an id produced by [`IscQuad::to_u64`].
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self {
            gds_quad_high: (value >> 32) as u32 as i32,
            gds_quad_low: value as u32,
        }
    }
}

/// Native field slot of an `XSQLDA`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XSQLVAR {
    pub sqltype: c_short,
    pub sqlscale: c_short,
    pub sqlsubtype: c_short,
    pub sqllen: c_short,
    pub sqldata: *mut c_char,
    pub sqlind: *mut c_short,
    pub sqlname_length: c_short,
    pub sqlname: [c_char; 32],
    pub relname_length: c_short,
    pub relname: [c_char; 32],
    pub ownname_length: c_short,
    pub ownname: [c_char; 32],
    pub aliasname_length: c_short,
    pub aliasname: [c_char; 32],
}

/// Native descriptor header. `sqlvar` is a flexible array; see
/// [`XsqldaBuffer`] for allocation.
#[repr(C)]
pub struct XSQLDA {
    pub version: c_short,
    pub sqldaid: [c_char; 8],
    pub sqldabc: c_int,
    pub sqln: c_short,
    pub sqld: c_short,
    pub sqlvar: [XSQLVAR; 1],
}

/// Transaction existence block for `isc_start_multiple`.
#[repr(C)]
pub struct IscTeb {
    pub db_ptr: *mut DbHandle,
    pub tpb_len: c_int,
    pub tpb_ptr: *const c_char,
}

/// Callback invoked by the client library when a queued event fires.
pub type IscEventCallback =
    unsafe extern "system" fn(arg: *mut c_void, length: c_ushort, updated: *const u8);

// ── Entry point signatures ──────────────────────────────────────────────
//
// `extern "system"` is stdcall on 32-bit Windows and the C convention
// everywhere else, which is exactly how fbclient exports its API.

pub type isc_attach_database_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    name_len: c_short,
    name: *const c_char,
    db: *mut DbHandle,
    dpb_len: c_short,
    dpb: *const c_char,
) -> IscStatus;

pub type isc_create_database_fn = isc_attach_database_fn;

pub type isc_db_release_fn =
    unsafe extern "system" fn(status: *mut IscStatus, db: *mut DbHandle) -> IscStatus;

pub type isc_database_info_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    item_len: c_short,
    items: *const c_char,
    buf_len: c_short,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_start_multiple_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    count: c_short,
    teb: *mut IscTeb,
) -> IscStatus;

pub type isc_tr_op_fn =
    unsafe extern "system" fn(status: *mut IscStatus, tr: *mut TrHandle) -> IscStatus;

pub type isc_prepare_transaction2_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    msg_len: c_ushort,
    msg: *const u8,
) -> IscStatus;

pub type isc_reconnect_transaction_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    tr: *mut TrHandle,
    id_len: c_short,
    id: *const c_char,
) -> IscStatus;

pub type isc_transaction_info_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    item_len: c_short,
    items: *const c_char,
    buf_len: c_short,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_dsql_allocate_statement_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    stmt: *mut StmtHandle,
) -> IscStatus;

pub type isc_dsql_prepare_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    stmt: *mut StmtHandle,
    length: c_ushort,
    text: *const c_char,
    dialect: c_ushort,
    sqlda: *mut XSQLDA,
) -> IscStatus;

pub type isc_dsql_describe_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    da_version: c_ushort,
    sqlda: *mut XSQLDA,
) -> IscStatus;

pub type isc_dsql_execute_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    stmt: *mut StmtHandle,
    da_version: c_ushort,
    in_sqlda: *const XSQLDA,
) -> IscStatus;

pub type isc_dsql_execute2_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    tr: *mut TrHandle,
    stmt: *mut StmtHandle,
    da_version: c_ushort,
    in_sqlda: *const XSQLDA,
    out_sqlda: *const XSQLDA,
) -> IscStatus;

pub type isc_dsql_execute_immediate_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    tr: *mut TrHandle,
    length: c_ushort,
    text: *const c_char,
    dialect: c_ushort,
    sqlda: *const XSQLDA,
) -> IscStatus;

pub type isc_dsql_fetch_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    da_version: c_ushort,
    sqlda: *const XSQLDA,
) -> IscStatus;

pub type isc_dsql_free_statement_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    option: c_ushort,
) -> IscStatus;

pub type isc_dsql_sql_info_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    item_len: c_short,
    items: *const c_char,
    buf_len: c_short,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_dsql_set_cursor_name_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    name: *const c_char,
    kind: c_ushort,
) -> IscStatus;

pub type fb_dsql_set_timeout_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    stmt: *mut StmtHandle,
    timeout: c_uint,
) -> IscStatus;

pub type isc_blob_open_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    tr: *mut TrHandle,
    blob: *mut BlobHandle,
    id: *mut IscQuad,
    bpb_len: c_short,
    bpb: *const c_char,
) -> IscStatus;

pub type isc_get_segment_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    blob: *mut BlobHandle,
    actual: *mut c_ushort,
    buf_len: c_ushort,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_put_segment_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    blob: *mut BlobHandle,
    len: c_ushort,
    buf: *const c_char,
) -> IscStatus;

pub type isc_blob_op_fn =
    unsafe extern "system" fn(status: *mut IscStatus, blob: *mut BlobHandle) -> IscStatus;

pub type isc_blob_info_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    blob: *mut BlobHandle,
    item_len: c_short,
    items: *const c_char,
    buf_len: c_short,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_seek_blob_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    blob: *mut BlobHandle,
    mode: c_short,
    offset: c_int,
    result: *mut c_int,
) -> IscStatus;

/// Variadic: one `char*` event name per `count`. Always cdecl.
pub type isc_event_block_fn = unsafe extern "C" fn(
    event_buf: *mut *mut u8,
    result_buf: *mut *mut u8,
    count: c_ushort,
    ...
) -> c_int;

pub type isc_que_events_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    event_id: *mut c_int,
    length: c_short,
    event_buf: *const u8,
    callback: IscEventCallback,
    arg: *mut c_void,
) -> IscStatus;

pub type isc_cancel_events_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    event_id: *mut c_int,
) -> IscStatus;

pub type isc_event_counts_fn = unsafe extern "system" fn(
    counts: *mut c_uint,
    length: c_short,
    event_buf: *mut u8,
    result_buf: *const u8,
);

pub type isc_free_fn = unsafe extern "system" fn(ptr: *mut c_char) -> c_int;

pub type fb_cancel_operation_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    db: *mut DbHandle,
    kind: c_ushort,
) -> IscStatus;

pub type fb_shutdown_fn = unsafe extern "system" fn(timeout: c_uint, reason: c_int) -> c_int;

pub type isc_service_attach_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    name_len: c_ushort,
    name: *const c_char,
    svc: *mut SvcHandle,
    spb_len: c_ushort,
    spb: *const c_char,
) -> IscStatus;

pub type isc_service_detach_fn =
    unsafe extern "system" fn(status: *mut IscStatus, svc: *mut SvcHandle) -> IscStatus;

pub type isc_service_query_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    svc: *mut SvcHandle,
    reserved: *mut ApiHandle,
    send_len: c_ushort,
    send: *const c_char,
    request_len: c_ushort,
    request: *const c_char,
    buf_len: c_ushort,
    buf: *mut c_char,
) -> IscStatus;

pub type isc_service_start_fn = unsafe extern "system" fn(
    status: *mut IscStatus,
    svc: *mut SvcHandle,
    reserved: *mut ApiHandle,
    spb_len: c_ushort,
    spb: *const c_char,
) -> IscStatus;
