use std::sync::Arc;

use strum::Display;

use super::database::{DatabaseInner, Session};
use super::registry::{ResourceId, ResourceKind};
use super::Transaction;
use crate::consts::{ISC_BAD_SEGSTR_HANDLE, ISC_SEGMENT, ISC_SEGSTR_EOF, ISC_SEGSTR_NO_OP};
use crate::error::{FbError, FbResult};
use crate::ffi::{BlobHandle, IscQuad, StatusVector};
use crate::info::{BlobInfo, BLOB_INFO_ITEMS};
use crate::params::ParameterBuffer;

/// Largest segment `isc_put_segment` and `isc_get_segment` accept.
pub const MAX_SEGMENT_SIZE: usize = u16::MAX as usize;

const BLOB_INFO_BUFFER: usize = 64;

/// Whether a blob handle is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BlobState {
    /// Not opened, or closed again.
    Closed,
    /// Open for reading or writing.
    Open,
}

/// Origin of [`Blob::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SeekMode {
    /// From the start.
    Absolute,
    /// From the current position.
    Relative,
    /// From the end.
    FromTail,
}

impl SeekMode {
    const fn code(self) -> i16 {
        match self {
            Self::Absolute => 0,
            Self::Relative => 1,
            Self::FromTail => 2,
        }
    }
}

/// A blob opened for reading or created for writing within a transaction.
pub struct Blob {
    db: Arc<DatabaseInner>,
    transaction: Transaction,
    id: ResourceId,
    blob_id: IscQuad,
    output: bool,
    bpb: Option<ParameterBuffer>,
    state: BlobState,
    eof: bool,
    buffer_size: usize,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("id", &self.id)
            .field("blob_id", &self.blob_id)
            .field("output", &self.output)
            .field("state", &self.state)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl Blob {
    pub(crate) fn new(
        db: Arc<DatabaseInner>,
        transaction: Transaction,
        blob_id: IscQuad,
        output: bool,
        bpb: Option<ParameterBuffer>,
    ) -> FbResult<Self> {
        if !transaction.belongs_to(&db) {
            return Err(FbError::InvalidArgument(
                "transaction belongs to another database".into(),
            ));
        }
        let id = db.lock_attached()?.registry.insert(ResourceKind::Blob);
        let buffer_size = db.properties.blob_buffer_size.clamp(1, MAX_SEGMENT_SIZE);
        Ok(Self {
            db,
            transaction,
            id,
            blob_id,
            output,
            bpb,
            state: BlobState::Closed,
            eof: false,
            buffer_size,
            scratch: Vec::new(),
        })
    }

    /// Blob id; for output blobs assigned by [`Blob::open`].
    #[must_use]
    pub const fn blob_id(&self) -> IscQuad {
        self.blob_id
    }

    /// Returns `true` for blobs created for writing.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        self.output
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> BlobState {
        self.state
    }

    /// Returns `true` once reading reached the end.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    fn open_handle(&self, session: &Session) -> FbResult<BlobHandle> {
        if self.state != BlobState::Open || !session.owns(self.id) {
            return Err(FbError::illegal_state_code(
                ISC_BAD_SEGSTR_HANDLE,
                "blob is not open",
            ));
        }
        Ok(session.registry.handle(self.id).unwrap_or(0))
    }

    fn require_direction(&self, output: bool) -> FbResult<()> {
        if self.output == output {
            return Ok(());
        }
        Err(FbError::illegal_state_code(
            ISC_SEGSTR_NO_OP,
            if output {
                "blob is open for reading"
            } else {
                "blob is open for writing"
            },
        ))
    }

    /// Creates the output blob or opens the input blob.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] if already open, if the transaction is
    ///   not active, or (with `isc_segstr_no_op`) for an output blob that
    ///   already has an id.
    /// * Errors reported by the library.
    pub fn open(&mut self) -> FbResult<()> {
        if self.state == BlobState::Open {
            return Err(FbError::illegal_state("blob is already open"));
        }
        if self.output && !self.blob_id.is_null() {
            return Err(FbError::illegal_state_code(
                ISC_SEGSTR_NO_OP,
                "output blob already has an id and cannot be opened again",
            ));
        }
        let db = Arc::clone(&self.db);
        let mut session = db.lock_attached()?;
        if !session.owns(self.id) {
            return Err(FbError::illegal_state_code(
                ISC_BAD_SEGSTR_HANDLE,
                "blob belongs to a closed attachment",
            ));
        }
        let mut tr = self.transaction.native_handle(&session)?;
        let mut db_handle = session.handle;
        let mut handle: BlobHandle = 0;
        let mut blob_id = self.blob_id;
        let bpb = self.bpb.as_ref().map_or(&[][..], ParameterBuffer::as_bytes);
        let mut status = StatusVector::new();
        let result = if self.output {
            db.client
                .create_blob(&mut status, &mut db_handle, &mut tr, &mut handle, &mut blob_id, bpb)
        } else {
            db.client
                .open_blob(&mut status, &mut db_handle, &mut tr, &mut handle, &mut blob_id, bpb)
        };
        if let Err(error) = result.and_then(|()| db.check(&status)) {
            if handle != 0 {
                let mut cleanup = StatusVector::new();
                if let Err(cleanup_error) = db.client.cancel_blob(&mut cleanup, &mut handle) {
                    log::debug!("cancelling half-opened blob failed: {cleanup_error}");
                }
            }
            return Err(error);
        }
        session.registry.set_handle(self.id, handle);
        self.blob_id = blob_id;
        self.state = BlobState::Open;
        self.eof = false;
        log::trace!(
            "{} blob {:#x}",
            if self.output { "created" } else { "opened" },
            blob_id.to_u64()
        );
        Ok(())
    }

    /// Reads one segment of at most `max_length` bytes. Returns an empty
    /// vector at the end of the blob.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] unless open for reading.
    /// * Errors reported by the library.
    pub fn get_segment(&mut self, max_length: usize) -> FbResult<Vec<u8>> {
        self.require_direction(false)?;
        let db = Arc::clone(&self.db);
        let session = db.lock_attached()?;
        let mut handle = self.open_handle(&session)?;
        if self.eof {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0; max_length.clamp(1, MAX_SEGMENT_SIZE)];
        let mut status = StatusVector::new();
        let length = db.client.get_segment(&mut status, &mut handle, &mut buffer)?;
        if db.check_expecting(&status, &[ISC_SEGMENT, ISC_SEGSTR_EOF])? == Some(ISC_SEGSTR_EOF) {
            self.eof = true;
        }
        buffer.truncate(length);
        Ok(buffer)
    }

    /// Reads into `out` until at least `minimum` bytes (at least one, at
    /// most `out.len()`) were read or the blob ends. Returns the number of
    /// bytes read.
    ///
    /// # Errors
    ///
    /// As [`Blob::get_segment`].
    pub fn read(&mut self, out: &mut [u8], minimum: usize) -> FbResult<usize> {
        let target = minimum.clamp(1, out.len().max(1)).min(out.len());
        let mut total = 0;
        while total < target && !self.eof {
            let segment = self.get_segment(out.len() - total)?;
            out[total..total + segment.len()].copy_from_slice(&segment);
            total += segment.len();
        }
        Ok(total)
    }

    /// Writes `data`, split into segments no longer than the configured
    /// blob buffer size.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] unless open for writing.
    /// * Errors reported by the library.
    pub fn write(&mut self, data: &[u8]) -> FbResult<()> {
        self.require_direction(true)?;
        let db = Arc::clone(&self.db);
        let session = db.lock_attached()?;
        let mut handle = self.open_handle(&session)?;
        let mut status = StatusVector::new();
        for chunk in data.chunks(self.buffer_size) {
            self.scratch.clear();
            self.scratch.extend_from_slice(chunk);
            status.reset();
            db.client
                .put_segment(&mut status, &mut handle, &self.scratch)?;
            db.check(&status)?;
        }
        Ok(())
    }

    /// Moves the read position. Returns the new position.
    ///
    /// # Errors
    ///
    /// * [`FbError::IllegalState`] unless open for reading.
    /// * Errors reported by the library, e.g. for segmented blobs.
    pub fn seek(&mut self, offset: i32, mode: SeekMode) -> FbResult<i32> {
        self.require_direction(false)?;
        let db = Arc::clone(&self.db);
        let session = db.lock_attached()?;
        let mut handle = self.open_handle(&session)?;
        let mut status = StatusVector::new();
        let position = db
            .client
            .seek_blob(&mut status, &mut handle, mode.code(), offset)?;
        db.check(&status)?;
        self.eof = false;
        Ok(position)
    }

    /// Raw `isc_blob_info` response for `items`.
    ///
    /// # Errors
    ///
    /// [`FbError::IllegalState`] unless open; errors reported by the
    /// library.
    pub fn blob_info(&self, items: &[u8], buffer_length: usize) -> FbResult<Vec<u8>> {
        let session = self.db.lock_attached()?;
        let mut handle = self.open_handle(&session)?;
        let mut status = StatusVector::new();
        let mut buffer = vec![0; buffer_length];
        self.db
            .client
            .blob_info(&mut status, &mut handle, items, &mut buffer)?;
        self.db.check(&status)?;
        Ok(buffer)
    }

    /// Segment count, sizes and type of the blob.
    ///
    /// # Errors
    ///
    /// As [`Blob::blob_info`].
    pub fn info(&self) -> FbResult<BlobInfo> {
        BlobInfo::parse(&self.blob_info(BLOB_INFO_ITEMS, BLOB_INFO_BUFFER)?)
    }

    /// Closes the blob; an output blob is committed to its id. Closing a
    /// closed blob does nothing.
    ///
    /// # Errors
    ///
    /// Errors reported by the library; the blob stays open.
    pub fn close(&mut self) -> FbResult<()> {
        self.finish(false)
    }

    /// Discards an output blob, or closes an input blob. Cancelling a
    /// closed blob does nothing.
    ///
    /// # Errors
    ///
    /// Errors reported by the library; the blob stays open.
    pub fn cancel(&mut self) -> FbResult<()> {
        self.finish(true)
    }

    fn finish(&mut self, cancel: bool) -> FbResult<()> {
        if self.state == BlobState::Closed {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        let mut session = db.lock()?;
        if session.owns(self.id) {
            let mut handle = session.registry.handle(self.id).unwrap_or(0);
            if handle != 0 {
                let mut status = StatusVector::new();
                if cancel {
                    db.client.cancel_blob(&mut status, &mut handle)?;
                } else {
                    db.client.close_blob(&mut status, &mut handle)?;
                }
                db.check(&status)?;
            }
            session.registry.set_handle(self.id, 0);
        }
        self.state = BlobState::Closed;
        Ok(())
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        let Ok(mut session) = self.db.lock() else {
            return;
        };
        let current = session.owns(self.id);
        let handle = session.registry.remove(self.id).unwrap_or(0);
        if self.state != BlobState::Open || !current || handle == 0 {
            return;
        }
        let mut handle = handle;
        let mut status = StatusVector::new();
        let result = if self.output {
            self.db.client.cancel_blob(&mut status, &mut handle)
        } else {
            self.db.client.close_blob(&mut status, &mut handle)
        };
        if let Err(error) = result {
            log::debug!("releasing abandoned blob failed: {error}");
        }
    }
}
