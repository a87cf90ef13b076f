//! Owned native XSQLDA with per-field data buffers and null indicators.

use std::alloc::{self, Layout};
use std::os::raw::c_char;
use std::ptr::NonNull;

use super::{XSQLDA, XSQLVAR};
use crate::consts::SQLDA_VERSION1;
use crate::error::{FbError, FbResult};

const NAME_CAPACITY: usize = 32;

/// Upper bound for the number of field slots (`sqln` is a signed short).
pub const MAX_SQLVARS: usize = i16::MAX as usize;

/// Copy of the descriptive part of one `XSQLVAR`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SqlVar {
    /// Type code; odd values are nullable.
    pub sqltype: i16,
    /// Scale of exact numerics.
    pub sqlscale: i16,
    /// Subtype (character set id for text types).
    pub sqlsubtype: i16,
    /// Declared length in bytes.
    pub sqllen: i16,
    /// Column name, raw bytes in the connection encoding.
    pub field_name: Vec<u8>,
    /// Relation name.
    pub relation_name: Vec<u8>,
    /// Owner name.
    pub owner_name: Vec<u8>,
    /// Column alias.
    pub alias_name: Vec<u8>,
}

/// A native-layout `XSQLDA` together with the memory its slots point to.
///
/// Field slots are addressed by index. Data buffers and null indicators are
/// owned by this struct and are only reachable through the slot pointers,
/// so the client library and the accessors here always see the same bytes.
pub struct XsqldaBuffer {
    ptr: NonNull<XSQLDA>,
    layout: Layout,
    slots: usize,
    data: Vec<Vec<u8>>,
    indicators: Vec<i16>,
}

// SAFETY: the buffer exclusively owns everything its pointers reach.
unsafe impl Send for XsqldaBuffer {}

impl std::fmt::Debug for XsqldaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XsqldaBuffer")
            .field("sqln", &self.capacity())
            .field("sqld", &self.described_count())
            .finish_non_exhaustive()
    }
}

impl XsqldaBuffer {
    /// Allocates a zeroed descriptor with room for `capacity` fields.
    ///
    /// A descriptor always has at least one slot; `sqln` is set to
    /// `capacity` (possibly zero).
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if `capacity` exceeds [`MAX_SQLVARS`].
    pub fn new(capacity: usize) -> FbResult<Self> {
        if capacity > MAX_SQLVARS {
            return Err(FbError::LimitExceeded {
                what: "descriptor fields",
                limit: MAX_SQLVARS,
                actual: capacity,
            });
        }
        let slots = capacity.max(1);
        let layout = Layout::array::<XSQLVAR>(slots - 1)
            .and_then(|extra| Layout::new::<XSQLDA>().extend(extra))
            .map(|(layout, _)| layout.pad_to_align())
            .map_err(|_| FbError::LimitExceeded {
                what: "descriptor fields",
                limit: MAX_SQLVARS,
                actual: capacity,
            })?;

        // SAFETY: `layout` has a non-zero size (it contains an XSQLDA).
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<XSQLDA>()) else {
            alloc::handle_alloc_error(layout);
        };

        let mut buffer = Self {
            ptr,
            layout,
            slots,
            data: vec![Vec::new(); slots],
            indicators: vec![0; slots],
        };
        // SAFETY: freshly allocated and zeroed; we only write header fields.
        unsafe {
            let header = buffer.ptr.as_mut();
            header.version = SQLDA_VERSION1 as i16;
            header.sqln = capacity as i16;
            header.sqld = 0;
        }
        Ok(buffer)
    }

    /// Number of slots the native library may fill (`sqln`).
    #[must_use]
    pub fn capacity(&self) -> usize {
        // SAFETY: header is initialized in `new`.
        usize::try_from(unsafe { self.ptr.as_ref() }.sqln).unwrap_or(0)
    }

    /// Number of fields described by the library (`sqld`). May exceed
    /// [`XsqldaBuffer::capacity`], meaning a larger descriptor is needed.
    #[must_use]
    pub fn described_count(&self) -> usize {
        // SAFETY: header is initialized in `new`.
        usize::try_from(unsafe { self.ptr.as_ref() }.sqld).unwrap_or(0)
    }

    /// Sets `sqld`.
    pub fn set_described_count(&mut self, count: usize) {
        // SAFETY: header is initialized in `new`.
        unsafe { self.ptr.as_mut() }.sqld = count.min(MAX_SQLVARS) as i16;
    }

    fn slot(&self, index: usize) -> Option<&XSQLVAR> {
        if index >= self.capacity() {
            return None;
        }
        // SAFETY: `index < sqln <= slots`, all slots lie inside the allocation.
        Some(unsafe { &*self.slot_ptr(index) })
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut XSQLVAR> {
        if index >= self.capacity() {
            return None;
        }
        // SAFETY: as in `slot`, and `&mut self` guarantees exclusivity.
        Some(unsafe { &mut *self.slot_ptr(index) })
    }

    fn slot_ptr(&self, index: usize) -> *mut XSQLVAR {
        debug_assert!(index < self.slots);
        // SAFETY: `sqlvar` is the trailing array of the allocation.
        unsafe {
            std::ptr::addr_of_mut!((*self.ptr.as_ptr()).sqlvar)
                .cast::<XSQLVAR>()
                .add(index)
        }
    }

    /// Descriptive fields of slot `index`.
    #[must_use]
    pub fn var(&self, index: usize) -> Option<SqlVar> {
        self.slot(index).map(|var| SqlVar {
            sqltype: var.sqltype,
            sqlscale: var.sqlscale,
            sqlsubtype: var.sqlsubtype,
            sqllen: var.sqllen,
            field_name: read_name(&var.sqlname, var.sqlname_length),
            relation_name: read_name(&var.relname, var.relname_length),
            owner_name: read_name(&var.ownname, var.ownname_length),
            alias_name: read_name(&var.aliasname, var.aliasname_length),
        })
    }

    /// Overwrites the descriptive fields of slot `index`, leaving its data
    /// buffer untouched. Names longer than 32 bytes are cut.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn set_var(&mut self, index: usize, value: &SqlVar) -> bool {
        let Some(var) = self.slot_mut(index) else {
            return false;
        };
        var.sqltype = value.sqltype;
        var.sqlscale = value.sqlscale;
        var.sqlsubtype = value.sqlsubtype;
        var.sqllen = value.sqllen;
        var.sqlname_length = write_name(&mut var.sqlname, &value.field_name);
        var.relname_length = write_name(&mut var.relname, &value.relation_name);
        var.ownname_length = write_name(&mut var.ownname, &value.owner_name);
        var.aliasname_length = write_name(&mut var.aliasname, &value.alias_name);
        true
    }

    /// Current `sqllen` of slot `index`.
    #[must_use]
    pub fn sqllen(&self, index: usize) -> Option<usize> {
        self.slot(index)
            .map(|var| usize::try_from(var.sqllen).unwrap_or(0))
    }

    /// Sets `sqllen` of slot `index`.
    pub fn set_sqllen(&mut self, index: usize, length: usize) {
        if let Some(var) = self.slot_mut(index) {
            var.sqllen = length.min(i16::MAX as usize) as i16;
        }
    }

    /// Allocates a zeroed data buffer of `size` bytes for slot `index` and
    /// points `sqldata`/`sqlind` at it.
    pub fn allocate_data(&mut self, index: usize, size: usize) {
        if index >= self.capacity() {
            return;
        }
        self.data[index] = vec![0; size];
        let data_ptr = self.data[index].as_mut_ptr().cast::<c_char>();
        let ind_ptr = self.indicators.as_mut_ptr().wrapping_add(index);
        if let Some(var) = self.slot_mut(index) {
            var.sqldata = data_ptr;
            var.sqlind = ind_ptr;
        }
    }

    /// Data buffer of slot `index` (empty if none was allocated).
    #[must_use]
    pub fn data(&self, index: usize) -> &[u8] {
        match self.data.get(index) {
            // SAFETY: pointer and length describe the live buffer; reading
            // through `as_ptr` keeps the slot pointer valid.
            Some(buffer) => unsafe { std::slice::from_raw_parts(buffer.as_ptr(), buffer.len()) },
            None => &[],
        }
    }

    /// Mutable data buffer of slot `index` (empty if none was allocated).
    pub fn data_mut(&mut self, index: usize) -> &mut [u8] {
        match self.data.get_mut(index) {
            // SAFETY: as in `data`, with exclusive access through `&mut self`.
            Some(buffer) => unsafe {
                std::slice::from_raw_parts_mut(buffer.as_mut_ptr(), buffer.len())
            },
            None => &mut [],
        }
    }

    /// Null indicator of slot `index` (`0` not null, `-1` null).
    #[must_use]
    pub fn indicator(&self, index: usize) -> Option<i16> {
        if index >= self.capacity() {
            return None;
        }
        // SAFETY: in bounds; the library writes it only during calls that
        // borrow `self` mutably.
        Some(unsafe { self.indicators.as_ptr().add(index).read() })
    }

    /// Sets the null indicator of slot `index`.
    pub fn set_indicator(&mut self, index: usize, value: i16) {
        if index < self.capacity() {
            // SAFETY: in bounds, see `indicator`.
            unsafe { self.indicators.as_mut_ptr().add(index).write(value) };
        }
    }

    pub(crate) fn as_ptr(&self) -> *const XSQLDA {
        self.ptr.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut XSQLDA {
        self.ptr.as_ptr()
    }
}

impl Drop for XsqldaBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), self.layout) };
    }
}

fn read_name(raw: &[c_char; NAME_CAPACITY], length: i16) -> Vec<u8> {
    let length = usize::try_from(length).unwrap_or(0).min(NAME_CAPACITY);
    raw[..length].iter().map(|c| *c as u8).collect()
}

fn write_name(raw: &mut [c_char; NAME_CAPACITY], value: &[u8]) -> i16 {
    let length = value.len().min(NAME_CAPACITY);
    raw.fill(0);
    for (dst, src) in raw.iter_mut().zip(&value[..length]) {
        *dst = *src as c_char;
    }
    length as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_version_one() {
        let buffer = XsqldaBuffer::new(3).unwrap();
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.described_count(), 0);
        // SAFETY: test inspection of an initialized header.
        assert_eq!(unsafe { (*buffer.as_ptr()).version }, 1);
    }

    #[test]
    fn empty_descriptor_keeps_one_slot() {
        let buffer = XsqldaBuffer::new(0).unwrap();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.var(0).is_none());
    }

    #[test]
    fn too_many_fields_rejected() {
        let err = XsqldaBuffer::new(MAX_SQLVARS + 1).unwrap_err();
        assert!(matches!(err, FbError::LimitExceeded { .. }));
    }

    #[test]
    fn var_round_trip_cuts_long_names() {
        let mut buffer = XsqldaBuffer::new(2).unwrap();
        let var = SqlVar {
            sqltype: 449,
            sqllen: 10,
            field_name: b"NAME".to_vec(),
            alias_name: vec![b'A'; 40],
            ..SqlVar::default()
        };
        assert!(buffer.set_var(1, &var));
        let read = buffer.var(1).unwrap();
        assert_eq!(read.sqltype, 449);
        assert_eq!(read.field_name, b"NAME");
        assert_eq!(read.alias_name.len(), 32);
        assert!(!buffer.set_var(2, &var));
    }

    #[test]
    fn data_and_indicator_go_through_slot_pointers() {
        let mut buffer = XsqldaBuffer::new(1).unwrap();
        buffer.allocate_data(0, 4);
        buffer.data_mut(0).copy_from_slice(&[1, 2, 3, 4]);
        buffer.set_indicator(0, -1);

        // SAFETY: test inspection of slot pointers set by `allocate_data`.
        let (ind, first) = unsafe {
            let var = &(*buffer.as_ptr()).sqlvar[0];
            (*var.sqlind, *var.sqldata)
        };
        assert_eq!(ind, -1);
        assert_eq!(first, 1);
        assert_eq!(buffer.indicator(0), Some(-1));
        assert_eq!(buffer.data(0), &[1, 2, 3, 4]);
    }
}
