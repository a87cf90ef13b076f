use std::sync::Arc;

use crate::error::{FbError, FbResult};
use crate::ffi::EventBlock;

/// Receives event notifications. Called on a thread owned by the client
/// library; implementations must return quickly.
pub trait EventHandler: Send + Sync {
    /// The event `event_name` was posted. Use
    /// [`Database::count_events`](super::Database::count_events) to learn
    /// how often.
    fn event_occurred(&self, event_name: &str);
}

/// Registration for one named event.
///
/// The size is `-1` until the buffers are allocated and again after
/// [`EventHandle::release`]. Cancel a queued handle before releasing it.
pub struct EventHandle {
    event_name: String,
    handler: Arc<dyn EventHandler>,
    block: Option<Arc<EventBlock>>,
    size: isize,
    event_id: i32,
    event_count: u32,
}

impl std::fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandle")
            .field("event_name", &self.event_name)
            .field("size", &self.size)
            .field("event_id", &self.event_id)
            .field("event_count", &self.event_count)
            .finish_non_exhaustive()
    }
}

impl EventHandle {
    pub(crate) fn new(event_name: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            event_name: event_name.into(),
            handler,
            block: None,
            size: -1,
            event_id: 0,
            event_count: 0,
        }
    }

    /// Name of the event.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Length of the event buffers, `-1` when unallocated or released.
    #[must_use]
    pub const fn size(&self) -> isize {
        self.size
    }

    /// Returns `true` while the buffers are allocated.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.size >= 0 && self.block.as_ref().is_some_and(|block| !block.is_released())
    }

    /// Id assigned by the last `isc_que_events`.
    #[must_use]
    pub const fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Count from the last [`Database::count_events`](super::Database::count_events).
    #[must_use]
    pub const fn event_count(&self) -> u32 {
        self.event_count
    }

    pub(crate) fn allocate(&mut self, block: Arc<EventBlock>) {
        self.size = isize::try_from(block.len()).unwrap_or(isize::MAX);
        self.block = Some(block);
    }

    pub(crate) fn require_block(&self) -> FbResult<Arc<EventBlock>> {
        self.block
            .as_ref()
            .filter(|_| self.is_allocated())
            .cloned()
            .ok_or_else(|| {
                FbError::illegal_state(format!(
                    "event handle for {} is not allocated",
                    self.event_name
                ))
            })
    }

    /// Routes the next notification of `block` to the handler.
    pub(crate) fn arm(&self, block: &EventBlock) {
        let handler = Arc::clone(&self.handler);
        let name = self.event_name.clone();
        block.set_notify(Arc::new(move || handler.event_occurred(&name)));
    }

    pub(crate) fn event_id_mut(&mut self) -> &mut i32 {
        &mut self.event_id
    }

    pub(crate) fn set_event_count(&mut self, count: u32) {
        self.event_count = count;
    }

    /// Frees the event buffers. Releasing twice does nothing.
    pub fn release(&mut self) {
        if let Some(block) = self.block.take() {
            block.release();
            log::trace!("released event handle for {}", self.event_name);
        }
        self.size = -1;
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        self.release();
    }
}
