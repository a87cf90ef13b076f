//! Parsing of `isc_*_info` response buffers.
//!
//! A response is a sequence of `tag, length (2 bytes LE), value` clumplets
//! terminated by `isc_info_end`. `isc_info_truncated` means the buffer was
//! too small for the full answer.

use strum::Display;

use crate::coder::{DatatypeCoder, LittleEndianDatatypeCoder};
use crate::consts::{
    ISC_INFO_BLOB_MAX_SEGMENT, ISC_INFO_BLOB_NUM_SEGMENTS, ISC_INFO_BLOB_TOTAL_LENGTH,
    ISC_INFO_BLOB_TYPE, ISC_INFO_DB_SQL_DIALECT, ISC_INFO_END, ISC_INFO_ERROR,
    ISC_INFO_ODS_MINOR_VERSION, ISC_INFO_ODS_VERSION, ISC_INFO_SQL_STMT_COMMIT,
    ISC_INFO_SQL_STMT_DDL, ISC_INFO_SQL_STMT_DELETE, ISC_INFO_SQL_STMT_EXEC_PROCEDURE,
    ISC_INFO_SQL_STMT_GET_SEGMENT, ISC_INFO_SQL_STMT_INSERT, ISC_INFO_SQL_STMT_PUT_SEGMENT,
    ISC_INFO_SQL_STMT_ROLLBACK, ISC_INFO_SQL_STMT_SAVEPOINT, ISC_INFO_SQL_STMT_SELECT,
    ISC_INFO_SQL_STMT_SELECT_FOR_UPD, ISC_INFO_SQL_STMT_SET_GENERATOR,
    ISC_INFO_SQL_STMT_START_TRANS, ISC_INFO_SQL_STMT_TYPE, ISC_INFO_SQL_STMT_UPDATE,
    ISC_INFO_TRA_ID, ISC_INFO_TRUNCATED,
};
use crate::error::{FbError, FbResult};

/// Items requested by [`Database::database_info`](crate::db::Database::database_info)
/// callers interested in [`DatabaseInfo`].
pub const DATABASE_INFO_ITEMS: &[u8] = &[
    ISC_INFO_ODS_VERSION,
    ISC_INFO_ODS_MINOR_VERSION,
    ISC_INFO_DB_SQL_DIALECT,
    ISC_INFO_END,
];

/// Items requested to learn the statement type.
pub const STATEMENT_TYPE_ITEMS: &[u8] = &[ISC_INFO_SQL_STMT_TYPE, ISC_INFO_END];

/// Items requested to learn the transaction id.
pub const TRANSACTION_ID_ITEMS: &[u8] = &[ISC_INFO_TRA_ID, ISC_INFO_END];

/// Items requested for [`BlobInfo`].
pub const BLOB_INFO_ITEMS: &[u8] = &[
    ISC_INFO_BLOB_NUM_SEGMENTS,
    ISC_INFO_BLOB_MAX_SEGMENT,
    ISC_INFO_BLOB_TOTAL_LENGTH,
    ISC_INFO_BLOB_TYPE,
    ISC_INFO_END,
];

/// Reads a little-endian signed integer of `length` bytes (0 to 8), as
/// `isc_vax_integer` does.
#[must_use]
pub fn vax_integer(buf: &[u8], offset: usize, length: usize) -> i64 {
    let coder = LittleEndianDatatypeCoder;
    let decoded = match length {
        2 => coder.decode_short(buf, offset).map(i64::from).ok(),
        4 => coder.decode_int(buf, offset).map(i64::from).ok(),
        8 => coder.decode_long(buf, offset).ok(),
        _ => None,
    };
    if let Some(value) = decoded {
        return value;
    }
    let Some(bytes) = offset
        .checked_add(length.min(8))
        .and_then(|end| buf.get(offset..end))
    else {
        return 0;
    };
    let mut value: i64 = 0;
    for (index, byte) in bytes.iter().enumerate() {
        let shifted = if index + 1 == bytes.len() {
            i64::from(*byte as i8) << (8 * index)
        } else {
            i64::from(*byte) << (8 * index)
        };
        value = value.wrapping_add(shifted);
    }
    value
}

/// One parsed clumplet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoItem {
    /// Item tag.
    pub tag: u8,
    /// Raw value.
    pub value: Vec<u8>,
}

impl InfoItem {
    /// Value as a little-endian integer.
    #[must_use]
    pub fn as_int(&self) -> i64 {
        vax_integer(&self.value, 0, self.value.len())
    }
}

/// A parsed info response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoResponse {
    /// Items in response order.
    pub items: Vec<InfoItem>,
    /// Whether the library ran out of buffer space.
    pub truncated: bool,
}

impl InfoResponse {
    /// First item with `tag`.
    #[must_use]
    pub fn get(&self, tag: u8) -> Option<&InfoItem> {
        self.items.iter().find(|item| item.tag == tag)
    }

    /// Integer value of the first item with `tag`.
    #[must_use]
    pub fn int(&self, tag: u8) -> Option<i64> {
        self.get(tag).map(InfoItem::as_int)
    }
}

/// Parses `buffer`.
///
/// # Errors
///
/// * [`FbError::InvalidArgument`] if an item overruns the buffer.
/// * [`FbError::InvalidArgument`] if the library answered
///   `isc_info_error` for a requested item.
pub fn parse(buffer: &[u8]) -> FbResult<InfoResponse> {
    let mut response = InfoResponse::default();
    let mut pos = 0;
    while let Some(&tag) = buffer.get(pos) {
        match tag {
            ISC_INFO_END => break,
            ISC_INFO_TRUNCATED => {
                response.truncated = true;
                break;
            }
            _ => {}
        }
        let length = buffer
            .get(pos + 1..pos + 3)
            .map(|bytes| usize::from(u16::from_le_bytes([bytes[0], bytes[1]])))
            .ok_or_else(|| {
                FbError::InvalidArgument(format!("info item {tag} at {pos} lacks its length"))
            })?;
        let start = pos + 3;
        let value = buffer.get(start..start + length).ok_or_else(|| {
            FbError::InvalidArgument(format!(
                "info item {tag} at {pos} claims {length} bytes past the end of the buffer"
            ))
        })?;
        if tag == ISC_INFO_ERROR {
            return Err(FbError::InvalidArgument(format!(
                "info request failed with code {}",
                vax_integer(value, 0, value.len())
            )));
        }
        response.items.push(InfoItem {
            tag,
            value: value.to_vec(),
        });
        pos = start + length;
    }
    Ok(response)
}

fn parse_complete(buffer: &[u8], what: &'static str) -> FbResult<InfoResponse> {
    let response = parse(buffer)?;
    if response.truncated {
        log::debug!("{what} info response truncated at {} bytes", buffer.len());
        return Err(FbError::LimitExceeded {
            what: "info buffer",
            limit: buffer.len(),
            actual: buffer.len() + 1,
        });
    }
    Ok(response)
}

/// Database properties from [`DATABASE_INFO_ITEMS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database SQL dialect.
    pub dialect: u16,
    /// On-disk structure major version.
    pub ods_major: u16,
    /// On-disk structure minor version.
    pub ods_minor: u16,
}

impl DatabaseInfo {
    /// Parses a response to [`DATABASE_INFO_ITEMS`].
    ///
    /// # Errors
    ///
    /// Propagates [`parse`] errors. A truncated response is
    /// [`FbError::LimitExceeded`].
    pub fn parse(buffer: &[u8]) -> FbResult<Self> {
        let response = parse_complete(buffer, "database")?;
        let small = |tag| {
            response
                .int(tag)
                .and_then(|value| u16::try_from(value).ok())
                .unwrap_or(0)
        };
        Ok(Self {
            dialect: small(ISC_INFO_DB_SQL_DIALECT),
            ods_major: small(ISC_INFO_ODS_VERSION),
            ods_minor: small(ISC_INFO_ODS_MINOR_VERSION),
        })
    }
}

/// Blob properties from [`BLOB_INFO_ITEMS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobInfo {
    /// Number of segments.
    pub segment_count: i64,
    /// Length of the longest segment.
    pub max_segment: i64,
    /// Total length in bytes.
    pub total_length: i64,
    /// `0` segmented, `1` stream.
    pub blob_type: i64,
}

impl BlobInfo {
    /// Parses a response to [`BLOB_INFO_ITEMS`].
    ///
    /// # Errors
    ///
    /// Propagates [`parse`] errors. A truncated response is
    /// [`FbError::LimitExceeded`].
    pub fn parse(buffer: &[u8]) -> FbResult<Self> {
        let response = parse_complete(buffer, "blob")?;
        Ok(Self {
            segment_count: response.int(ISC_INFO_BLOB_NUM_SEGMENTS).unwrap_or(0),
            max_segment: response.int(ISC_INFO_BLOB_MAX_SEGMENT).unwrap_or(0),
            total_length: response.int(ISC_INFO_BLOB_TOTAL_LENGTH).unwrap_or(0),
            blob_type: response.int(ISC_INFO_BLOB_TYPE).unwrap_or(0),
        })
    }
}

/// Transaction id from a response to [`TRANSACTION_ID_ITEMS`].
///
/// # Errors
///
/// Propagates [`parse`] errors; [`FbError::InvalidArgument`] if the id is
/// missing.
pub fn parse_transaction_id(buffer: &[u8]) -> FbResult<i64> {
    parse_complete(buffer, "transaction")?
        .int(ISC_INFO_TRA_ID)
        .ok_or_else(|| FbError::InvalidArgument("transaction info lacks isc_info_tra_id".into()))
}

/// Statement type reported by `isc_info_sql_stmt_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatementType {
    /// `SELECT`.
    Select,
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
    /// Data definition.
    Ddl,
    /// Blob segment read.
    GetSegment,
    /// Blob segment write.
    PutSegment,
    /// `EXECUTE PROCEDURE`; returns at most one row.
    ExecProcedure,
    /// `SET TRANSACTION`.
    StartTransaction,
    /// `COMMIT`.
    Commit,
    /// `ROLLBACK`.
    Rollback,
    /// `SELECT ... FOR UPDATE`.
    SelectForUpdate,
    /// `SET GENERATOR`.
    SetGenerator,
    /// `SAVEPOINT`.
    Savepoint,
    /// A code this crate does not know.
    #[strum(to_string = "Unknown({0})")]
    Unknown(i32),
}

impl StatementType {
    /// Maps an `isc_info_sql_stmt_*` code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            ISC_INFO_SQL_STMT_SELECT => Self::Select,
            ISC_INFO_SQL_STMT_INSERT => Self::Insert,
            ISC_INFO_SQL_STMT_UPDATE => Self::Update,
            ISC_INFO_SQL_STMT_DELETE => Self::Delete,
            ISC_INFO_SQL_STMT_DDL => Self::Ddl,
            ISC_INFO_SQL_STMT_GET_SEGMENT => Self::GetSegment,
            ISC_INFO_SQL_STMT_PUT_SEGMENT => Self::PutSegment,
            ISC_INFO_SQL_STMT_EXEC_PROCEDURE => Self::ExecProcedure,
            ISC_INFO_SQL_STMT_START_TRANS => Self::StartTransaction,
            ISC_INFO_SQL_STMT_COMMIT => Self::Commit,
            ISC_INFO_SQL_STMT_ROLLBACK => Self::Rollback,
            ISC_INFO_SQL_STMT_SELECT_FOR_UPD => Self::SelectForUpdate,
            ISC_INFO_SQL_STMT_SET_GENERATOR => Self::SetGenerator,
            ISC_INFO_SQL_STMT_SAVEPOINT => Self::Savepoint,
            other => Self::Unknown(other),
        }
    }

    /// Whether execution opens a cursor.
    #[must_use]
    pub const fn opens_cursor(self) -> bool {
        matches!(self, Self::Select | Self::SelectForUpdate)
    }

    /// Parses a response to [`STATEMENT_TYPE_ITEMS`].
    ///
    /// # Errors
    ///
    /// Propagates [`parse`] errors; [`FbError::InvalidArgument`] if the
    /// type is missing.
    pub fn parse(buffer: &[u8]) -> FbResult<Self> {
        let code = parse_complete(buffer, "statement")?
            .int(ISC_INFO_SQL_STMT_TYPE)
            .ok_or_else(|| {
                FbError::InvalidArgument("statement info lacks isc_info_sql_stmt_type".into())
            })?;
        Ok(Self::from_code(i32::try_from(code).unwrap_or(-1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[0x01], 1, 1)]
    #[test_case(&[0xff], 1, -1)]
    #[test_case(&[0x34, 0x12], 2, 0x1234)]
    #[test_case(&[0x00, 0x00, 0x01], 3, 0x01_0000)]
    #[test_case(&[0xfe, 0xff, 0xff, 0xff], 4, -2)]
    #[test_case(&[], 0, 0)]
    fn vax_integers(bytes: &[u8], length: usize, expected: i64) {
        assert_eq!(vax_integer(bytes, 0, length), expected);
    }

    #[test]
    fn vax_integer_out_of_bounds_is_zero() {
        assert_eq!(vax_integer(&[1, 2], 1, 4), 0);
    }

    #[test]
    fn database_info() {
        let buffer = [
            ISC_INFO_ODS_VERSION, 4, 0, 13, 0, 0, 0,
            ISC_INFO_ODS_MINOR_VERSION, 4, 0, 1, 0, 0, 0,
            ISC_INFO_DB_SQL_DIALECT, 1, 0, 3,
            ISC_INFO_END,
        ];
        let info = DatabaseInfo::parse(&buffer).unwrap();
        assert_eq!(
            info,
            DatabaseInfo {
                dialect: 3,
                ods_major: 13,
                ods_minor: 1
            }
        );
    }

    #[test]
    fn statement_type() {
        let buffer = [ISC_INFO_SQL_STMT_TYPE, 4, 0, 8, 0, 0, 0, ISC_INFO_END];
        let kind = StatementType::parse(&buffer).unwrap();
        assert_eq!(kind, StatementType::ExecProcedure);
        assert!(!kind.opens_cursor());
        assert_eq!(StatementType::from_code(99).to_string(), "Unknown(99)");
    }

    #[test]
    fn truncated_response_is_reported() {
        let buffer = [ISC_INFO_TRA_ID, 4, 0, 7, 0, 0, 0, ISC_INFO_TRUNCATED];
        let response = parse(&buffer).unwrap();
        assert!(response.truncated);
        assert_eq!(response.int(ISC_INFO_TRA_ID), Some(7));
        assert!(matches!(
            parse_transaction_id(&buffer),
            Err(FbError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn overrunning_item_is_an_error() {
        assert!(parse(&[ISC_INFO_TRA_ID, 9, 0, 1]).is_err());
    }

    #[test]
    fn info_error_is_an_error() {
        assert!(parse(&[ISC_INFO_ERROR, 1, 0, 5, ISC_INFO_END]).is_err());
    }

    #[test]
    fn blob_info() {
        let buffer = [
            ISC_INFO_BLOB_NUM_SEGMENTS, 2, 0, 3, 0,
            ISC_INFO_BLOB_MAX_SEGMENT, 2, 0, 0xff, 0x7f,
            ISC_INFO_BLOB_TOTAL_LENGTH, 4, 0, 0, 0, 1, 0,
            ISC_INFO_BLOB_TYPE, 1, 0, 0,
            ISC_INFO_END,
        ];
        let info = BlobInfo::parse(&buffer).unwrap();
        assert_eq!(info.segment_count, 3);
        assert_eq!(info.max_segment, 0x7fff);
        assert_eq!(info.total_length, 0x01_0000);
        assert_eq!(info.blob_type, 0);
    }
}
