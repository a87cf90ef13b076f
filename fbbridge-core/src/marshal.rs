//! Conversion between [`RowValue`]s and native XSQLDA buffers.

use crate::coder::DatatypeCoder;
use crate::consts::{CS_BINARY, SQLIND_NOT_NULL, SQLIND_NULL};
use crate::encoding::Encoding;
use crate::error::{FbError, FbResult};
use crate::ffi::{SqlVar, XsqldaBuffer};
use crate::fields::{FieldDescriptor, RowDescriptor, RowValue};

const VARYING_PREFIX: usize = 2;

/// Allocates an XSQLDA shaped like `row`.
///
/// Every slot is marked nullable (`sqltype | 1`) so that null can be sent
/// for any field, and gets a data buffer of
/// [`FieldDescriptor::data_buffer_size`] bytes.
///
/// # Errors
///
/// [`FbError::LimitExceeded`] if `row` has more fields or a longer field
/// than an XSQLDA can describe.
pub fn allocate(row: &RowDescriptor) -> FbResult<XsqldaBuffer> {
    let mut buffer = XsqldaBuffer::new(row.count())?;
    buffer.set_described_count(row.count());
    for (index, field) in row.fields().iter().enumerate() {
        let sqllen = i16::try_from(field.length).map_err(|_| FbError::LimitExceeded {
            what: "field length",
            limit: i16::MAX as usize,
            actual: field.length,
        })?;
        buffer.set_var(
            index,
            &SqlVar {
                sqltype: (field.sql_type | 1) as i16,
                sqlscale: field.scale as i16,
                sqlsubtype: field.sub_type as i16,
                sqllen,
                ..SqlVar::default()
            },
        );
        buffer.allocate_data(index, field.data_buffer_size());
    }
    Ok(buffer)
}

/// Writes `values` into `buffer`, which must have been allocated for `row`.
///
/// Null values only set the indicator. `VARCHAR` data is prefixed with its
/// length in native byte order; `CHAR` buffers are space-filled first unless
/// the field is binary.
///
/// # Errors
///
/// * [`FbError::InvalidArgument`] if the number of values differs from the
///   number of fields.
/// * [`FbError::LimitExceeded`] if a value is longer than its field's
///   declared length. Nothing is truncated.
pub fn encode_row(
    buffer: &mut XsqldaBuffer,
    row: &RowDescriptor,
    values: &[Option<Vec<u8>>],
    coder: &dyn DatatypeCoder,
) -> FbResult<()> {
    if values.len() != row.count() {
        return Err(FbError::InvalidArgument(format!(
            "expected {} values, got {}",
            row.count(),
            values.len()
        )));
    }
    if let Some((field, data)) = row
        .fields()
        .iter()
        .zip(values)
        .find_map(|(field, value)| value.as_ref().map(|data| (field, data)).filter(|(f, d)| d.len() > f.length))
    {
        return Err(FbError::LimitExceeded {
            what: "field data",
            limit: field.length,
            actual: data.len(),
        });
    }

    for (index, (field, value)) in row.fields().iter().zip(values).enumerate() {
        buffer.data_mut(index).fill(0);
        match value {
            None => buffer.set_indicator(index, SQLIND_NULL),
            Some(data) => {
                buffer.set_indicator(index, SQLIND_NOT_NULL);
                write_field(buffer, index, field, data, coder)?;
            }
        }
    }
    Ok(())
}

fn write_field(
    buffer: &mut XsqldaBuffer,
    index: usize,
    field: &FieldDescriptor,
    data: &[u8],
    coder: &dyn DatatypeCoder,
) -> FbResult<()> {
    let mut offset = 0;
    if field.is_varying() {
        buffer.set_sqllen(index, field.length.min(data.len()));
        coder.encode_short_into(data.len() as i16, buffer.data_mut(index), 0)?;
        offset = VARYING_PREFIX;
    } else if field.is_fixed_text() {
        buffer.set_sqllen(index, field.length.min(data.len()));
        if field.sub_type != CS_BINARY {
            let target = buffer.data_mut(index);
            let pad = field.length.min(target.len());
            target[..pad].fill(b' ');
        }
    }
    let target = buffer.data_mut(index);
    let end = offset + data.len();
    let Some(slot) = target.get_mut(offset..end) else {
        return Err(FbError::LimitExceeded {
            what: "field buffer",
            limit: target.len().saturating_sub(offset),
            actual: data.len(),
        });
    };
    slot.copy_from_slice(data);
    Ok(())
}

/// Reads a row out of `buffer`.
///
/// A non-zero null indicator yields `None`. Varying fields read their
/// length prefix; other fields read `sqllen` bytes.
///
/// # Errors
///
/// [`FbError::InvalidArgument`] if a length points past the data buffer.
pub fn decode_row(
    buffer: &XsqldaBuffer,
    row: &RowDescriptor,
    coder: &dyn DatatypeCoder,
) -> FbResult<RowValue> {
    row.fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            if buffer.indicator(index).unwrap_or(SQLIND_NULL) != SQLIND_NOT_NULL {
                return Ok(None);
            }
            let data = buffer.data(index);
            let (offset, length) = if field.is_varying() {
                let length = coder.decode_short(data, 0)? as u16;
                (VARYING_PREFIX, usize::from(length))
            } else {
                (0, buffer.sqllen(index).unwrap_or(0))
            };
            data.get(offset..offset + length)
                .map(|bytes| Some(bytes.to_vec()))
                .ok_or_else(|| {
                    FbError::InvalidArgument(format!(
                        "field {index} claims {length} bytes but its buffer has {}",
                        data.len().saturating_sub(offset)
                    ))
                })
        })
        .collect()
}

/// Builds a row descriptor from a descriptor the library filled in
/// (`isc_dsql_describe` / `isc_dsql_describe_bind`).
#[must_use]
pub fn describe(buffer: &XsqldaBuffer, encoding: Encoding) -> RowDescriptor {
    let count = buffer.described_count().min(buffer.capacity());
    (0..count)
        .filter_map(|index| buffer.var(index))
        .map(|var| FieldDescriptor {
            sql_type: i32::from(var.sqltype) & !1,
            nullable: var.sqltype & 1 == 1,
            sub_type: i32::from(var.sqlsubtype),
            scale: i32::from(var.sqlscale),
            length: usize::try_from(var.sqllen).unwrap_or(0),
            field_name: encoding.decode(&var.field_name),
            relation_name: encoding.decode(&var.relation_name),
            alias: encoding.decode(&var.alias_name),
            owner_name: encoding.decode(&var.owner_name),
        })
        .collect()
}
