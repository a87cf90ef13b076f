//! Status vectors, native string reads and event buffers.

use std::any::Any;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_ushort};
use std::sync::{Arc, Mutex, PoisonError};

use super::{isc_free_fn, IscStatus, STATUS_VECTOR_SIZE};
use crate::consts::{
    ISC_ARG_CSTRING, ISC_ARG_END, ISC_ARG_GDS, ISC_ARG_INTERPRETED, ISC_ARG_NUMBER,
    ISC_ARG_SQL_STATE, ISC_ARG_STRING, ISC_ARG_WARNING,
};

/// Argument used to fill a status vector from Rust code.
///
/// String arguments must be `'static` so that every pointer stored in a
/// [`StatusVector`] is either owned by the client library or by the program
/// image.
#[derive(Debug, Clone, Copy)]
pub enum StatusArg {
    /// `isc_arg_gds` with an error code.
    Gds(i32),
    /// `isc_arg_warning` with a warning code.
    Warning(i32),
    /// `isc_arg_string`.
    Text(&'static CStr),
    /// `isc_arg_interpreted`.
    Interpreted(&'static CStr),
    /// `isc_arg_sql_state`.
    SqlState(&'static CStr),
    /// `isc_arg_cstring` (length + pointer).
    CString(&'static [u8]),
    /// `isc_arg_number`.
    Number(i64),
    /// `isc_arg_string` with a null pointer.
    NullText,
    /// A tag the decoder does not know, followed by one value. Tags that
    /// carry pointers are written as `isc_arg_number` instead.
    Other(i32, i64),
}

/// Fixed-size `ISC_STATUS[20]` array filled by every native call.
#[derive(Clone, PartialEq, Eq)]
pub struct StatusVector {
    words: [IscStatus; STATUS_VECTOR_SIZE],
}

impl Default for StatusVector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end = self
            .words
            .iter()
            .position(|w| *w == ISC_ARG_END as IscStatus)
            .unwrap_or(STATUS_VECTOR_SIZE);
        f.debug_list().entries(&self.words[..end.max(2)]).finish()
    }
}

impl StatusVector {
    /// Creates a zeroed vector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; STATUS_VECTOR_SIZE],
        }
    }

    /// Clears the vector before a call.
    pub fn reset(&mut self) {
        self.words = [0; STATUS_VECTOR_SIZE];
    }

    /// Raw elements.
    #[must_use]
    pub const fn words(&self) -> &[IscStatus; STATUS_VECTOR_SIZE] {
        &self.words
    }

    /// Element at `index`, or `isc_arg_end` past the end of the vector.
    #[must_use]
    pub fn word(&self, index: usize) -> IscStatus {
        self.words
            .get(index)
            .copied()
            .unwrap_or(ISC_ARG_END as IscStatus)
    }

    /// Returns `true` if the vector carries an error code in its first slot.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.words[0] == ISC_ARG_GDS as IscStatus && self.words[1] != 0
    }

    /// Replaces the contents with `args`, terminated by `isc_arg_end`.
    /// Arguments that do not fit are dropped.
    pub fn load(&mut self, args: &[StatusArg]) {
        self.reset();
        let mut pos = 0;
        for arg in args {
            let encoded: [IscStatus; 3] = match *arg {
                StatusArg::Gds(code) => [ISC_ARG_GDS as IscStatus, code as IscStatus, 0],
                StatusArg::Warning(code) => [ISC_ARG_WARNING as IscStatus, code as IscStatus, 0],
                StatusArg::Text(s) => [ISC_ARG_STRING as IscStatus, s.as_ptr() as IscStatus, 0],
                StatusArg::Interpreted(s) => {
                    [ISC_ARG_INTERPRETED as IscStatus, s.as_ptr() as IscStatus, 0]
                }
                StatusArg::SqlState(s) => [ISC_ARG_SQL_STATE as IscStatus, s.as_ptr() as IscStatus, 0],
                StatusArg::CString(bytes) => [
                    ISC_ARG_CSTRING as IscStatus,
                    bytes.len() as IscStatus,
                    bytes.as_ptr() as IscStatus,
                ],
                StatusArg::Number(n) => [ISC_ARG_NUMBER as IscStatus, n as IscStatus, 0],
                StatusArg::NullText => [ISC_ARG_STRING as IscStatus, 0, 0],
                StatusArg::Other(tag, value) => {
                    let tag = if is_pointer_tag(tag) { ISC_ARG_NUMBER } else { tag };
                    [tag as IscStatus, value as IscStatus, 0]
                }
            };
            let width = if matches!(arg, StatusArg::CString(_)) { 3 } else { 2 };
            // keep one slot for isc_arg_end
            if pos + width >= STATUS_VECTOR_SIZE {
                break;
            }
            self.words[pos..pos + width].copy_from_slice(&encoded[..width]);
            pos += width;
        }
        self.words[pos] = ISC_ARG_END as IscStatus;
    }

    /// Reads the nul-terminated string whose address is stored at `index`.
    ///
    /// Returns `None` for a null pointer.
    #[must_use]
    pub fn string_at(&self, index: usize) -> Option<Vec<u8>> {
        let address = self.word(index);
        if address == 0 {
            return None;
        }
        // SAFETY: non-null pointers in a status vector come from the client
        // library (valid until the next call on the same vector) or from
        // `load`, which only stores `'static` data.
        let value = unsafe { CStr::from_ptr(address as *const c_char) };
        Some(value.to_bytes().to_vec())
    }

    /// Reads `isc_arg_cstring` data: length at `index`, pointer at `index + 1`.
    ///
    /// Returns `None` for a null pointer.
    #[must_use]
    pub fn counted_string_at(&self, index: usize) -> Option<Vec<u8>> {
        let length = usize::try_from(self.word(index)).unwrap_or(0);
        let address = self.word(index + 1);
        if address == 0 {
            return None;
        }
        // SAFETY: see `string_at`; the library guarantees `length` readable bytes.
        let value = unsafe { std::slice::from_raw_parts(address as *const u8, length) };
        Some(value.to_vec())
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut IscStatus {
        self.words.as_mut_ptr()
    }
}

const fn is_pointer_tag(tag: i32) -> bool {
    matches!(
        tag,
        ISC_ARG_STRING | ISC_ARG_CSTRING | ISC_ARG_INTERPRETED | ISC_ARG_SQL_STATE
    )
}

// ── Events ──────────────────────────────────────────────────────────────

const EPB_VERSION1: u8 = 1;

/// Builds an event parameter block for a single event, the layout produced
/// by `isc_event_block`: version, name length, name, 32-bit count.
#[must_use]
pub fn event_buffer(event_name: &[u8]) -> Vec<u8> {
    let name = &event_name[..event_name.len().min(usize::from(u8::MAX))];
    let mut buffer = Vec::with_capacity(name.len() + 6);
    buffer.push(EPB_VERSION1);
    buffer.push(name.len() as u8);
    buffer.extend_from_slice(name);
    buffer.extend_from_slice(&0u32.to_le_bytes());
    buffer
}

/// Count difference of the first event between `event_buf` (previous
/// counts) and `result_buf` (updated counts).
#[must_use]
pub fn event_count_delta(event_buf: &[u8], result_buf: &[u8]) -> u32 {
    let read_count = |buffer: &[u8]| {
        let name_len = usize::from(*buffer.get(1)?);
        let start = 2 + name_len;
        let bytes: [u8; 4] = buffer.get(start..start + 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    };
    match (read_count(event_buf), read_count(result_buf)) {
        (Some(old), Some(new)) => new.wrapping_sub(old),
        _ => 0,
    }
}

/// Called once per delivery of a queued event.
pub type EventNotify = Arc<dyn Fn() + Send + Sync>;

enum EventStorage {
    Native {
        event: *mut u8,
        result: *mut u8,
        free: isc_free_fn,
        // keeps the client library mapped while the buffers exist
        _library: Arc<dyn Any + Send + Sync>,
    },
    Owned {
        event: Vec<u8>,
        result: Vec<u8>,
    },
    Released,
}

// SAFETY: native buffers are only touched while the `Mutex` in
// `EventBlock` is held.
unsafe impl Send for EventStorage {}

/// Event and result buffers of one event registration.
///
/// Created by `isc_event_block` (or [`EventBlock::owned`] for buffers built
/// in Rust). The library writes updated counts through the event callback,
/// which lands in [`EventBlock::deliver`].
pub struct EventBlock {
    storage: Mutex<EventStorage>,
    length: usize,
    notify: Mutex<Option<EventNotify>>,
}

impl std::fmt::Debug for EventBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBlock")
            .field("length", &self.length)
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}

impl EventBlock {
    /// Buffers allocated by Rust, laid out like `isc_event_block` output.
    #[must_use]
    pub fn owned(event_name: &[u8]) -> Self {
        let event = event_buffer(event_name);
        let result = event.clone();
        Self {
            length: event.len(),
            storage: Mutex::new(EventStorage::Owned { event, result }),
            notify: Mutex::new(None),
        }
    }

    /// Wraps buffers allocated by `isc_event_block`.
    ///
    /// # Safety
    ///
    /// `event` and `result` must point to `length` bytes allocated by the
    /// client library whose `isc_free` is `free`, and `library` must keep
    /// that library loaded.
    pub(crate) unsafe fn native(
        event: *mut u8,
        result: *mut u8,
        length: usize,
        free: isc_free_fn,
        library: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            length,
            storage: Mutex::new(EventStorage::Native {
                event,
                result,
                free,
                _library: library,
            }),
            notify: Mutex::new(None),
        }
    }

    /// Buffer length reported by `isc_event_block`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` for a zero-length block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` once [`EventBlock::release`] ran.
    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(
            *self.storage.lock().unwrap_or_else(PoisonError::into_inner),
            EventStorage::Released
        )
    }

    /// Installs the function called after each delivery.
    pub fn set_notify(&self, notify: EventNotify) {
        *self.notify.lock().unwrap_or_else(PoisonError::into_inner) = Some(notify);
    }

    /// Runs `f` with the event buffer and the result buffer.
    ///
    /// Returns `None` once the block has been released.
    pub fn with_buffers<R>(&self, f: impl FnOnce(&mut [u8], &mut [u8]) -> R) -> Option<R> {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *storage {
            EventStorage::Native { event, result, .. } => {
                // SAFETY: both buffers are `length` bytes (see `native`) and
                // exclusively borrowed under the lock.
                let (event, result) = unsafe {
                    (
                        std::slice::from_raw_parts_mut(*event, self.length),
                        std::slice::from_raw_parts_mut(*result, self.length),
                    )
                };
                Some(f(event, result))
            }
            EventStorage::Owned { event, result } => Some(f(event, result)),
            EventStorage::Released => None,
        }
    }

    /// Copies `updated` into the result buffer and runs the notify function.
    pub fn deliver(&self, updated: &[u8]) {
        let copied = self.with_buffers(|_, result| {
            let n = updated.len().min(result.len());
            result[..n].copy_from_slice(&updated[..n]);
        });
        if copied.is_none() {
            log::debug!("event delivered to a released event block");
            return;
        }
        let notify = self
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(notify) = notify {
            notify();
        }
    }

    /// Frees the buffers. Idempotent.
    pub fn release(&self) {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        if let EventStorage::Native {
            event, result, free, ..
        } = std::mem::replace(&mut *storage, EventStorage::Released)
        {
            // SAFETY: buffers were allocated by this library's
            // isc_event_block and are freed exactly once.
            unsafe {
                free(event.cast());
                free(result.cast());
            }
        }
    }

    /// Pointer handed to `isc_que_events` as the callback argument. The
    /// reference it carries is reclaimed by [`event_trampoline`].
    pub(crate) fn callback_arg(self: &Arc<Self>) -> *mut c_void {
        Arc::into_raw(Arc::clone(self)).cast_mut().cast()
    }

    pub(crate) fn event_ptr(&self) -> Option<*const u8> {
        match &*self.storage.lock().unwrap_or_else(PoisonError::into_inner) {
            EventStorage::Native { event, .. } => Some(event.cast_const()),
            EventStorage::Owned { event, .. } => Some(event.as_ptr()),
            EventStorage::Released => None,
        }
    }
}

impl Drop for EventBlock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Callback registered with `isc_que_events`.
///
/// # Safety
///
/// `arg` must come from [`EventBlock::callback_arg`] and is consumed here;
/// `updated` must be null or point to `length` readable bytes.
pub(crate) unsafe extern "system" fn event_trampoline(
    arg: *mut c_void,
    length: c_ushort,
    updated: *const u8,
) {
    if arg.is_null() {
        return;
    }
    let block = Arc::from_raw(arg.cast_const().cast::<EventBlock>());
    // a cancelled registration fires with no buffer
    if updated.is_null() {
        return;
    }
    block.deliver(std::slice::from_raw_parts(updated, usize::from(length)));
}

/// Drops the reference carried by a callback argument that the library
/// never used.
///
/// # Safety
///
/// `arg` must come from [`EventBlock::callback_arg`] and must not be passed
/// to [`event_trampoline`] afterwards.
pub(crate) unsafe fn reclaim_callback_arg(arg: *mut c_void) {
    if !arg.is_null() {
        drop(Arc::from_raw(arg.cast_const().cast::<EventBlock>()));
    }
}
