//! Status vector decoding.
//!
//! Every native call fills an `ISC_STATUS[20]` array. The decoder walks it
//! tag by tag and turns it into either nothing (success), a list of
//! warnings (success with diagnostics) or one [`DatabaseError`] whose first
//! entry is the first error code seen.

use crate::consts::{
    ISC_ARG_CSTRING, ISC_ARG_END, ISC_ARG_GDS, ISC_ARG_INTERPRETED, ISC_ARG_NUMBER,
    ISC_ARG_SQL_STATE, ISC_ARG_STRING, ISC_ARG_WARNING,
};
use crate::encoding::Encoding;
use crate::error::{
    DatabaseError, DatabaseWarning, FbError, FbResult, MessageParameter, StatusEntry, StatusKind,
};
use crate::ffi::{StatusVector, STATUS_VECTOR_SIZE};

/// Receives warnings reported by successful native calls.
pub trait WarningCallback: Send + Sync {
    /// Called once per warning, in status vector order.
    fn warning(&self, warning: DatabaseWarning);
}

/// Result of decoding one status vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedStatus {
    /// All error and warning entries in vector order.
    pub entries: Vec<StatusEntry>,
    /// SQLSTATE, if the vector carried one.
    pub sql_state: Option<String>,
}

impl DecodedStatus {
    /// Returns `true` if no error or warning was reported.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if at least one error code was reported.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.entries.iter().any(|e| e.kind == StatusKind::Error)
    }

    /// Converts into an error, if one was reported. The first error entry is
    /// moved to the front and becomes the primary code.
    #[must_use]
    pub fn into_error(self) -> Option<DatabaseError> {
        let primary = self
            .entries
            .iter()
            .position(|e| e.kind == StatusKind::Error)?;
        let mut entries = self.entries;
        let first = entries.remove(primary);
        let error_code = first.code;
        entries.insert(0, first);
        Some(DatabaseError {
            error_code,
            sql_state: self.sql_state,
            entries,
        })
    }

    /// Splits into the error, if one was reported, or the warnings.
    ///
    /// # Errors
    ///
    /// The [`DatabaseError`] built by [`DecodedStatus::into_error`].
    pub fn into_result(self) -> Result<Vec<DatabaseWarning>, DatabaseError> {
        let warnings = self.warnings();
        self.into_error().map_or(Ok(warnings), Err)
    }

    /// Warning entries, in order.
    #[must_use]
    pub fn warnings(&self) -> Vec<DatabaseWarning> {
        self.entries
            .iter()
            .filter(|e| e.kind == StatusKind::Warning)
            .map(|e| DatabaseWarning {
                code: e.code,
                parameters: e.parameters.clone(),
            })
            .collect()
    }
}

fn push_parameter(entries: &mut [StatusEntry], parameter: MessageParameter) {
    if let Some(last) = entries.last_mut() {
        last.parameters.push(parameter);
    } else {
        log::debug!("status vector parameter {parameter} without preceding code ignored");
    }
}

/// Walks `status` and collects its entries. Strings are decoded with
/// `encoding`.
///
/// A null string pointer ends decoding; everything collected so far is
/// kept.
#[must_use]
pub fn decode(status: &StatusVector, encoding: Encoding) -> DecodedStatus {
    let mut decoded = DecodedStatus::default();
    let mut index = 0;
    while index < STATUS_VECTOR_SIZE {
        let tag = status.word(index) as i32;
        index += 1;
        match tag {
            ISC_ARG_END => break,
            ISC_ARG_GDS | ISC_ARG_WARNING => {
                let code = status.word(index) as i32;
                index += 1;
                log::debug!("status vector tag {tag}: code {code}");
                if code != 0 {
                    let kind = if tag == ISC_ARG_GDS {
                        StatusKind::Error
                    } else {
                        StatusKind::Warning
                    };
                    decoded.entries.push(StatusEntry::new(code, kind));
                }
            }
            ISC_ARG_INTERPRETED | ISC_ARG_STRING | ISC_ARG_SQL_STATE => {
                let Some(bytes) = status.string_at(index) else {
                    log::warn!("null string pointer in status vector at {index}; stopping");
                    break;
                };
                index += 1;
                let value = encoding.decode(&bytes);
                log::debug!("status vector tag {tag}: string {value:?}");
                if tag == ISC_ARG_SQL_STATE {
                    decoded.sql_state = Some(value);
                } else {
                    push_parameter(&mut decoded.entries, MessageParameter::Text(value));
                }
            }
            ISC_ARG_CSTRING => {
                let Some(bytes) = status.counted_string_at(index) else {
                    log::warn!("null string pointer in status vector at {}; stopping", index + 1);
                    break;
                };
                index += 2;
                let value = encoding.decode(&bytes);
                log::debug!("status vector tag {tag}: counted string {value:?}");
                push_parameter(&mut decoded.entries, MessageParameter::Text(value));
            }
            ISC_ARG_NUMBER => {
                let value = status.word(index) as i64;
                index += 1;
                log::debug!("status vector tag {tag}: number {value}");
                push_parameter(&mut decoded.entries, MessageParameter::Integer(value));
            }
            other => {
                let value = status.word(index) as i64;
                index += 1;
                log::debug!("status vector: unrecognized tag {other}, value {value}");
                push_parameter(&mut decoded.entries, MessageParameter::Integer(value));
            }
        }
    }
    decoded
}

/// Decodes `status` and acts on it: an error is returned, warnings are
/// handed to `callback` one at a time.
///
/// # Errors
///
/// [`FbError::Database`] if the vector reports an error.
pub fn process(
    status: &StatusVector,
    encoding: Encoding,
    callback: Option<&dyn WarningCallback>,
) -> FbResult<()> {
    let warnings = decode(status, encoding)
        .into_result()
        .map_err(FbError::Database)?;
    for warning in warnings {
        match callback {
            Some(callback) => callback.warning(warning),
            None => log::warn!("{warning}"),
        }
    }
    Ok(())
}
