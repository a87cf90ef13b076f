//! Row and field descriptors.

use crate::consts::{SQL_TEXT, SQL_VARYING};

/// Shape of one column or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldDescriptor {
    /// SQL type code with the nullable bit (`| 1`) cleared.
    pub sql_type: i32,
    /// Subtype; the character set id for text types.
    pub sub_type: i32,
    /// Scale of exact numerics.
    pub scale: i32,
    /// Declared length in bytes.
    pub length: usize,
    /// Whether the column accepts null.
    pub nullable: bool,
    /// Column name.
    pub field_name: String,
    /// Name of the table the column belongs to.
    pub relation_name: String,
    /// Output alias.
    pub alias: String,
    /// Owner of the relation.
    pub owner_name: String,
}

impl FieldDescriptor {
    /// Descriptor for `sql_type` with the given declared length; the
    /// nullable bit of `sql_type` is honoured.
    #[must_use]
    pub fn new(sql_type: i32, length: usize) -> Self {
        Self {
            sql_type: sql_type & !1,
            nullable: sql_type & 1 == 1,
            length,
            ..Self::default()
        }
    }

    /// Sets the subtype.
    #[must_use]
    pub const fn with_sub_type(mut self, sub_type: i32) -> Self {
        self.sub_type = sub_type;
        self
    }

    /// Sets the scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the column name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Returns `true` if the field's type is `sql_type` (ignoring the
    /// nullable bit).
    #[must_use]
    pub const fn is_fb_type(&self, sql_type: i32) -> bool {
        self.sql_type == sql_type & !1
    }

    /// Returns `true` for `VARCHAR`, whose data carries a 2-byte length
    /// prefix.
    #[must_use]
    pub const fn is_varying(&self) -> bool {
        self.is_fb_type(SQL_VARYING)
    }

    /// Returns `true` for `CHAR`.
    #[must_use]
    pub const fn is_fixed_text(&self) -> bool {
        self.is_fb_type(SQL_TEXT)
    }

    /// Size of the native data buffer: declared length plus 3 for varying
    /// fields (length prefix and terminator) or plus 1 otherwise.
    #[must_use]
    pub const fn data_buffer_size(&self) -> usize {
        if self.is_varying() {
            self.length + 3
        } else {
            self.length + 1
        }
    }
}

/// Ordered list of field descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowDescriptor {
    fields: Vec<FieldDescriptor>,
}

impl RowDescriptor {
    /// Creates a descriptor from `fields`.
    #[must_use]
    pub const fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// The descriptor with no fields.
    #[must_use]
    pub const fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Number of fields.
    #[must_use]
    pub fn count(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` without fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// All fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

impl FromIterator<FieldDescriptor> for RowDescriptor {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One row of values, `None` for SQL null. Values are in the byte layout of
/// their field type.
pub type RowValue = Vec<Option<Vec<u8>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{SQL_LONG, SQL_SHORT};
    use test_case::test_case;

    #[test_case(SQL_VARYING, 10, 13 ; "varying adds prefix and terminator")]
    #[test_case(SQL_TEXT, 10, 11 ; "text adds terminator")]
    #[test_case(SQL_LONG, 4, 5 ; "integers get the terminator byte too")]
    fn buffer_sizes(sql_type: i32, length: usize, expected: usize) {
        assert_eq!(FieldDescriptor::new(sql_type, length).data_buffer_size(), expected);
    }

    #[test]
    fn nullable_bit_is_split_off() {
        let field = FieldDescriptor::new(SQL_SHORT | 1, 2);
        assert_eq!(field.sql_type, SQL_SHORT);
        assert!(field.nullable);
        assert!(field.is_fb_type(SQL_SHORT | 1));
        assert!(!field.is_varying());
    }

    #[test]
    fn row_descriptor_access() {
        let row: RowDescriptor = [
            FieldDescriptor::new(SQL_LONG, 4).with_name("ID"),
            FieldDescriptor::new(SQL_VARYING, 20).with_name("NAME"),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.count(), 2);
        assert_eq!(row.field(1).map(|f| f.field_name.as_str()), Some("NAME"));
        assert!(row.field(2).is_none());
        assert!(RowDescriptor::empty().is_empty());
    }
}
