//! Fixed-width integer coding in the byte order of the native call
//! convention.
//!
//! The wire protocol is always big-endian; structures handed to the client
//! library in-process use the host byte order. [`EncodingFactory::native_coder`]
//! picks the right variant once per connection.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::encoding::Encoding;
use crate::error::{FbError, FbResult};

/// Byte order of a coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant byte first.
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// Byte order of the host.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }
}

fn slot<const N: usize>(buf: &[u8], offset: usize) -> FbResult<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| buf.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| out_of_range(N, offset, buf.len()))
}

fn slot_mut<const N: usize>(buf: &mut [u8], offset: usize) -> FbResult<&mut [u8]> {
    let len = buf.len();
    offset
        .checked_add(N)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or_else(|| out_of_range(N, offset, len))
}

fn out_of_range(width: usize, offset: usize, len: usize) -> FbError {
    FbError::InvalidArgument(format!(
        "{width} byte value at offset {offset} does not fit a buffer of {len} bytes"
    ))
}

/// Encodes and decodes 16, 32 and 64-bit integers.
///
/// Implementations are stateless; share them through
/// [`EncodingFactory::coder`] instead of constructing one per call.
pub trait DatatypeCoder: Send + Sync + 'static {
    /// Byte order used by this coder.
    fn byte_order(&self) -> ByteOrder;

    /// Encodes an `i16`.
    fn encode_short(&self, value: i16) -> [u8; 2];
    /// Decodes an `i16` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn decode_short(&self, buf: &[u8], offset: usize) -> FbResult<i16>;

    /// Encodes an `i32`.
    fn encode_int(&self, value: i32) -> [u8; 4];
    /// Decodes an `i32` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn decode_int(&self, buf: &[u8], offset: usize) -> FbResult<i32>;

    /// Encodes an `i64`.
    fn encode_long(&self, value: i64) -> [u8; 8];
    /// Decodes an `i64` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn decode_long(&self, buf: &[u8], offset: usize) -> FbResult<i64>;

    /// Writes an encoded `i16` into `buf` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn encode_short_into(&self, value: i16, buf: &mut [u8], offset: usize) -> FbResult<()> {
        slot_mut::<2>(buf, offset)?.copy_from_slice(&self.encode_short(value));
        Ok(())
    }

    /// Writes an encoded `i32` into `buf` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn encode_int_into(&self, value: i32, buf: &mut [u8], offset: usize) -> FbResult<()> {
        slot_mut::<4>(buf, offset)?.copy_from_slice(&self.encode_int(value));
        Ok(())
    }

    /// Writes an encoded `i64` into `buf` at `offset`.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if the buffer is too short.
    fn encode_long_into(&self, value: i64, buf: &mut [u8], offset: usize) -> FbResult<()> {
        slot_mut::<8>(buf, offset)?.copy_from_slice(&self.encode_long(value));
        Ok(())
    }
}

/// Big-endian coder.
#[derive(Debug, Default, Clone, Copy)]
pub struct BigEndianDatatypeCoder;

impl BigEndianDatatypeCoder {
    /// Reverses `buf` in place; used when a composite numeric value is
    /// assembled in the opposite order.
    pub fn reverse_bytes(buf: &mut [u8]) {
        buf.reverse();
    }
}

impl DatatypeCoder for BigEndianDatatypeCoder {
    fn byte_order(&self) -> ByteOrder {
        ByteOrder::BigEndian
    }

    fn encode_short(&self, value: i16) -> [u8; 2] {
        value.to_be_bytes()
    }

    fn decode_short(&self, buf: &[u8], offset: usize) -> FbResult<i16> {
        slot(buf, offset).map(i16::from_be_bytes)
    }

    fn encode_int(&self, value: i32) -> [u8; 4] {
        value.to_be_bytes()
    }

    fn decode_int(&self, buf: &[u8], offset: usize) -> FbResult<i32> {
        slot(buf, offset).map(i32::from_be_bytes)
    }

    fn encode_long(&self, value: i64) -> [u8; 8] {
        value.to_be_bytes()
    }

    fn decode_long(&self, buf: &[u8], offset: usize) -> FbResult<i64> {
        slot(buf, offset).map(i64::from_be_bytes)
    }
}

/// Little-endian coder.
#[derive(Debug, Default, Clone, Copy)]
pub struct LittleEndianDatatypeCoder;

impl DatatypeCoder for LittleEndianDatatypeCoder {
    fn byte_order(&self) -> ByteOrder {
        ByteOrder::LittleEndian
    }

    fn encode_short(&self, value: i16) -> [u8; 2] {
        value.to_le_bytes()
    }

    fn decode_short(&self, buf: &[u8], offset: usize) -> FbResult<i16> {
        slot(buf, offset).map(i16::from_le_bytes)
    }

    fn encode_int(&self, value: i32) -> [u8; 4] {
        value.to_le_bytes()
    }

    fn decode_int(&self, buf: &[u8], offset: usize) -> FbResult<i32> {
        slot(buf, offset).map(i32::from_le_bytes)
    }

    fn encode_long(&self, value: i64) -> [u8; 8] {
        value.to_le_bytes()
    }

    fn decode_long(&self, buf: &[u8], offset: usize) -> FbResult<i64> {
        slot(buf, offset).map(i64::from_le_bytes)
    }
}

/// Connection encoding plus a get-or-create cache of coders keyed by coder
/// type.
pub struct EncodingFactory {
    encoding: Encoding,
    coders: Mutex<HashMap<TypeId, Arc<dyn DatatypeCoder>>>,
}

impl std::fmt::Debug for EncodingFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingFactory")
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

impl EncodingFactory {
    /// Creates a factory for `encoding` with an empty coder cache.
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            coders: Mutex::new(HashMap::new()),
        }
    }

    /// The connection encoding.
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns the cached coder of type `C`, creating it on first use.
    pub fn coder<C: DatatypeCoder + Default>(&self) -> Arc<dyn DatatypeCoder> {
        let mut coders = self.coders.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            coders
                .entry(TypeId::of::<C>())
                .or_insert_with(|| Arc::new(C::default())),
        )
    }

    /// Coder matching the host byte order.
    pub fn native_coder(&self) -> Arc<dyn DatatypeCoder> {
        match ByteOrder::native() {
            ByteOrder::BigEndian => self.coder::<BigEndianDatatypeCoder>(),
            ByteOrder::LittleEndian => self.coder::<LittleEndianDatatypeCoder>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&BigEndianDatatypeCoder, [0x12, 0x34] ; "big endian")]
    #[test_case(&LittleEndianDatatypeCoder, [0x34, 0x12] ; "little endian")]
    fn short_byte_order(coder: &dyn DatatypeCoder, expected: [u8; 2]) {
        assert_eq!(coder.encode_short(0x1234), expected);
        assert_eq!(coder.decode_short(&expected, 0).unwrap(), 0x1234);
    }

    #[test]
    fn int_and_long_at_offset() {
        let coder = LittleEndianDatatypeCoder;
        let mut buf = [0u8; 12];
        coder.encode_int_into(-2, &mut buf, 0).unwrap();
        coder.encode_long_into(0x0102_0304_0506_0708, &mut buf, 4).unwrap();
        assert_eq!(&buf[..4], &[0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(buf[4], 0x08);
        assert_eq!(coder.decode_int(&buf, 0).unwrap(), -2);
        assert_eq!(coder.decode_long(&buf, 4).unwrap(), 0x0102_0304_0506_0708);

        let be = BigEndianDatatypeCoder;
        assert_eq!(be.encode_int(1), [0, 0, 0, 1]);
        assert_eq!(be.decode_long(&be.encode_long(i64::MIN), 0).unwrap(), i64::MIN);
    }

    #[test]
    fn short_buffer_is_an_error() {
        let coder = BigEndianDatatypeCoder;
        assert!(coder.decode_int(&[0, 0, 0], 0).is_err());
        assert!(coder.encode_short_into(1, &mut [0u8; 2], 1).is_err());
        assert!(coder.decode_short(&[0, 0], usize::MAX - 1).is_err());
    }

    #[test]
    fn reverse_bytes_flips_order() {
        let mut buf = BigEndianDatatypeCoder.encode_int(0x0A0B_0C0D);
        BigEndianDatatypeCoder::reverse_bytes(&mut buf);
        assert_eq!(buf, LittleEndianDatatypeCoder.encode_int(0x0A0B_0C0D));
    }

    #[test]
    fn factory_caches_coders() {
        let factory = EncodingFactory::new(Encoding::Utf8);
        let a = factory.coder::<BigEndianDatatypeCoder>();
        let b = factory.coder::<BigEndianDatatypeCoder>();
        let c = factory.coder::<LittleEndianDatatypeCoder>();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(factory.native_coder().byte_order(), ByteOrder::native());
        assert!(Arc::ptr_eq(&factory.native_coder(), &factory.native_coder()));
    }
}
