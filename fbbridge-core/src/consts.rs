//! Firebird client API constants used by the bridge.
//!
//! Values are part of the stable contract with `fbclient` and must not be
//! changed.

#![allow(missing_docs)]

// ── Status vector argument tags ─────────────────────────────────────────

pub const ISC_ARG_END: i32 = 0;
pub const ISC_ARG_GDS: i32 = 1;
pub const ISC_ARG_STRING: i32 = 2;
pub const ISC_ARG_CSTRING: i32 = 3;
pub const ISC_ARG_NUMBER: i32 = 4;
pub const ISC_ARG_INTERPRETED: i32 = 5;
pub const ISC_ARG_WARNING: i32 = 18;
pub const ISC_ARG_SQL_STATE: i32 = 19;

// ── Error codes ─────────────────────────────────────────────────────────

pub const ISC_BAD_DB_HANDLE: i32 = 335_544_324;
pub const ISC_BAD_REQ_HANDLE: i32 = 335_544_327;
pub const ISC_BAD_SEGSTR_HANDLE: i32 = 335_544_328;
pub const ISC_BAD_TRANS_HANDLE: i32 = 335_544_332;
pub const ISC_NO_CUR_REC: i32 = 335_544_348;
pub const ISC_SEGMENT: i32 = 335_544_366;
pub const ISC_SEGSTR_EOF: i32 = 335_544_367;
pub const ISC_SEGSTR_NO_OP: i32 = 335_544_368;
pub const ISC_UNAVAILABLE: i32 = 335_544_375;
pub const ISC_WISH_LIST: i32 = 335_544_378;
pub const ISC_IMP_EXC: i32 = 335_544_381;
pub const ISC_SQLERR: i32 = 335_544_436;
pub const ISC_TRA_STATE: i32 = 335_544_468;
pub const ISC_DSQL_CURSOR_ERR: i32 = 335_544_572;
pub const ISC_NETWORK_ERROR: i32 = 335_544_721;
pub const ISC_CANCELLED: i32 = 335_544_794;
pub const ISC_CURSOR_NOT_OPEN: i32 = 335_544_834;
pub const ISC_STRING_TRUNCATION: i32 = 335_544_914;

// ── SQL types (XSQLVAR.sqltype without the nullable bit) ───────────────

pub const SQL_VARYING: i32 = 448;
pub const SQL_TEXT: i32 = 452;
pub const SQL_DOUBLE: i32 = 480;
pub const SQL_FLOAT: i32 = 482;
pub const SQL_LONG: i32 = 496;
pub const SQL_SHORT: i32 = 500;
pub const SQL_TIMESTAMP: i32 = 510;
pub const SQL_BLOB: i32 = 520;
pub const SQL_D_FLOAT: i32 = 530;
pub const SQL_ARRAY: i32 = 540;
pub const SQL_QUAD: i32 = 550;
pub const SQL_TYPE_TIME: i32 = 560;
pub const SQL_TYPE_DATE: i32 = 570;
pub const SQL_INT64: i32 = 580;
pub const SQL_BOOLEAN: i32 = 32764;
pub const SQL_NULL: i32 = 32766;

/// Character set id of `OCTETS`; a CHAR/VARCHAR with this subtype is binary.
pub const CS_BINARY: i32 = 1;

// ── XSQLDA ──────────────────────────────────────────────────────────────

pub const SQLDA_VERSION1: u16 = 1;
pub const SQLIND_NULL: i16 = -1;
pub const SQLIND_NOT_NULL: i16 = 0;

// ── DSQL ────────────────────────────────────────────────────────────────

pub const DSQL_CLOSE: u16 = 1;
pub const DSQL_DROP: u16 = 2;
pub const DSQL_UNPREPARE: u16 = 4;

pub const FETCH_OK: IscStatusValue = 0;
pub const FETCH_NO_MORE_ROWS: IscStatusValue = 100;

/// Value type of fetch results (same width as a status vector element).
pub type IscStatusValue = isize;

// ── Cancel kinds for fb_cancel_operation ───────────────────────────────

pub const FB_CANCEL_DISABLE: u16 = 1;
pub const FB_CANCEL_ENABLE: u16 = 2;
pub const FB_CANCEL_RAISE: u16 = 3;
pub const FB_CANCEL_ABORT: u16 = 4;

// ── fb_shutdown reasons ─────────────────────────────────────────────────

pub const FB_SHUTRSN_APP_STOPPED: i32 = -3;

// ── Database parameter buffer ───────────────────────────────────────────

pub const ISC_DPB_VERSION1: u8 = 1;
pub const ISC_DPB_USER_NAME: u8 = 28;
pub const ISC_DPB_PASSWORD: u8 = 29;
pub const ISC_DPB_LC_CTYPE: u8 = 48;
pub const ISC_DPB_CONNECT_TIMEOUT: u8 = 57;
pub const ISC_DPB_SQL_ROLE_NAME: u8 = 60;
pub const ISC_DPB_SQL_DIALECT: u8 = 63;
pub const ISC_DPB_PROCESS_ID: u8 = 71;
pub const ISC_DPB_PROCESS_NAME: u8 = 74;
pub const ISC_DPB_UTF8_FILENAME: u8 = 77;
pub const ISC_DPB_CONFIG: u8 = 87;

// ── Service parameter buffer ────────────────────────────────────────────

pub const ISC_SPB_VERSION: u8 = 2;
pub const ISC_SPB_CURRENT_VERSION: u8 = 2;
pub const ISC_SPB_USER_NAME: u8 = ISC_DPB_USER_NAME;
pub const ISC_SPB_PASSWORD: u8 = ISC_DPB_PASSWORD;
pub const ISC_SPB_SQL_ROLE_NAME: u8 = 60;
pub const ISC_SPB_CONFIG: u8 = 123;

// ── Transaction parameter buffer ────────────────────────────────────────

pub const ISC_TPB_VERSION3: u8 = 3;
pub const ISC_TPB_CONSISTENCY: u8 = 1;
pub const ISC_TPB_CONCURRENCY: u8 = 2;
pub const ISC_TPB_WAIT: u8 = 6;
pub const ISC_TPB_NOWAIT: u8 = 7;
pub const ISC_TPB_READ: u8 = 8;
pub const ISC_TPB_WRITE: u8 = 9;
pub const ISC_TPB_READ_COMMITTED: u8 = 15;
pub const ISC_TPB_REC_VERSION: u8 = 17;
pub const ISC_TPB_NO_REC_VERSION: u8 = 18;

// ── Blob parameter buffer ───────────────────────────────────────────────

pub const ISC_BPB_VERSION1: u8 = 1;
pub const ISC_BPB_SOURCE_TYPE: u8 = 1;
pub const ISC_BPB_TARGET_TYPE: u8 = 2;
pub const ISC_BPB_TYPE: u8 = 3;
pub const ISC_BPB_SOURCE_INTERP: u8 = 4;
pub const ISC_BPB_TARGET_INTERP: u8 = 5;
pub const ISC_BPB_TYPE_SEGMENTED: u8 = 0;
pub const ISC_BPB_TYPE_STREAM: u8 = 1;

// ── Info items ──────────────────────────────────────────────────────────

pub const ISC_INFO_END: u8 = 1;
pub const ISC_INFO_TRUNCATED: u8 = 2;
pub const ISC_INFO_ERROR: u8 = 3;
pub const ISC_INFO_ODS_VERSION: u8 = 32;
pub const ISC_INFO_ODS_MINOR_VERSION: u8 = 33;
pub const ISC_INFO_DB_SQL_DIALECT: u8 = 62;
pub const ISC_INFO_SVC_SERVER_VERSION: u8 = 55;
pub const ISC_INFO_SVC_IMPLEMENTATION: u8 = 56;
pub const ISC_INFO_SQL_STMT_TYPE: u8 = 21;
pub const ISC_INFO_TRA_ID: u8 = 4;
pub const ISC_INFO_BLOB_NUM_SEGMENTS: u8 = 4;
pub const ISC_INFO_BLOB_MAX_SEGMENT: u8 = 5;
pub const ISC_INFO_BLOB_TOTAL_LENGTH: u8 = 6;
pub const ISC_INFO_BLOB_TYPE: u8 = 7;

// ── Statement types (isc_info_sql_stmt_type) ────────────────────────────

pub const ISC_INFO_SQL_STMT_SELECT: i32 = 1;
pub const ISC_INFO_SQL_STMT_INSERT: i32 = 2;
pub const ISC_INFO_SQL_STMT_UPDATE: i32 = 3;
pub const ISC_INFO_SQL_STMT_DELETE: i32 = 4;
pub const ISC_INFO_SQL_STMT_DDL: i32 = 5;
pub const ISC_INFO_SQL_STMT_GET_SEGMENT: i32 = 6;
pub const ISC_INFO_SQL_STMT_PUT_SEGMENT: i32 = 7;
pub const ISC_INFO_SQL_STMT_EXEC_PROCEDURE: i32 = 8;
pub const ISC_INFO_SQL_STMT_START_TRANS: i32 = 9;
pub const ISC_INFO_SQL_STMT_COMMIT: i32 = 10;
pub const ISC_INFO_SQL_STMT_ROLLBACK: i32 = 11;
pub const ISC_INFO_SQL_STMT_SELECT_FOR_UPD: i32 = 12;
pub const ISC_INFO_SQL_STMT_SET_GENERATOR: i32 = 13;
pub const ISC_INFO_SQL_STMT_SAVEPOINT: i32 = 14;

// ── Blob seek modes ─────────────────────────────────────────────────────

pub const BLB_SEEK_FROM_HEAD: i16 = 0;
pub const BLB_SEEK_RELATIVE: i16 = 1;
pub const BLB_SEEK_FROM_TAIL: i16 = 2;
