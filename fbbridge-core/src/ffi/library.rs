//! A loaded `fbclient` (or embedded engine) shared library.

use std::any::Any;
use std::ffi::{CStr, OsStr};
use std::os::raw::{c_char, c_int, c_short, c_uint, c_ushort};
use std::sync::{Arc, PoisonError, RwLock};

use libloading::Library;

use super::memory::{event_trampoline, reclaim_callback_arg};
use super::*;
use crate::client::FbClientApi;
use crate::consts::FB_SHUTRSN_APP_STOPPED;
use crate::error::{FbError, FbResult, LoadError};
use crate::features::{ClientFeature, ClientFeatures};
use crate::tracker::NativeResource;

/// Entry points resolved from the library. Function pointers stay valid as
/// long as the owning [`Loaded`] (and its `Library`) is alive.
struct Symbols {
    isc_attach_database: isc_attach_database_fn,
    isc_create_database: isc_create_database_fn,
    isc_detach_database: isc_db_release_fn,
    isc_drop_database: isc_db_release_fn,
    isc_database_info: isc_database_info_fn,
    isc_start_multiple: isc_start_multiple_fn,
    isc_commit_transaction: isc_tr_op_fn,
    isc_commit_retaining: isc_tr_op_fn,
    isc_rollback_transaction: isc_tr_op_fn,
    isc_rollback_retaining: isc_tr_op_fn,
    isc_prepare_transaction2: isc_prepare_transaction2_fn,
    isc_reconnect_transaction: isc_reconnect_transaction_fn,
    isc_transaction_info: isc_transaction_info_fn,
    isc_dsql_allocate_statement: isc_dsql_allocate_statement_fn,
    isc_dsql_prepare: isc_dsql_prepare_fn,
    isc_dsql_describe: isc_dsql_describe_fn,
    isc_dsql_describe_bind: isc_dsql_describe_fn,
    isc_dsql_execute: isc_dsql_execute_fn,
    isc_dsql_execute2: isc_dsql_execute2_fn,
    isc_dsql_execute_immediate: isc_dsql_execute_immediate_fn,
    isc_dsql_fetch: isc_dsql_fetch_fn,
    isc_dsql_free_statement: isc_dsql_free_statement_fn,
    isc_dsql_sql_info: isc_dsql_sql_info_fn,
    isc_dsql_set_cursor_name: isc_dsql_set_cursor_name_fn,
    isc_create_blob2: isc_blob_open_fn,
    isc_open_blob2: isc_blob_open_fn,
    isc_get_segment: isc_get_segment_fn,
    isc_put_segment: isc_put_segment_fn,
    isc_close_blob: isc_blob_op_fn,
    isc_cancel_blob: isc_blob_op_fn,
    isc_blob_info: isc_blob_info_fn,
    isc_seek_blob: isc_seek_blob_fn,
    isc_event_block: isc_event_block_fn,
    isc_que_events: isc_que_events_fn,
    isc_cancel_events: isc_cancel_events_fn,
    isc_event_counts: isc_event_counts_fn,
    isc_free: isc_free_fn,
    isc_service_attach: isc_service_attach_fn,
    isc_service_detach: isc_service_detach_fn,
    isc_service_query: isc_service_query_fn,
    isc_service_start: isc_service_start_fn,
    fb_ping: Option<isc_db_release_fn>,
    fb_cancel_operation: Option<fb_cancel_operation_fn>,
    fb_disconnect_transaction: Option<isc_tr_op_fn>,
    fb_dsql_set_timeout: Option<fb_dsql_set_timeout_fn>,
    fb_shutdown: Option<fb_shutdown_fn>,
}

struct Loaded {
    symbols: Symbols,
    // dropped last: unloads the library
    _library: Library,
}

fn mandatory<T: Copy>(library: &Library, name: &str, symbol: &'static str) -> Result<T, LoadError> {
    // SAFETY: `T` is the documented signature of `symbol`.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|s| *s)
        .map_err(|_| LoadError::MissingEntryPoint {
            library: name.to_string(),
            symbol,
        })
}

fn optional<T: Copy>(library: &Library, symbol: &'static str) -> Option<T> {
    // SAFETY: `T` is the documented signature of `symbol`.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .map(|s| *s)
        .ok()
}

impl Symbols {
    fn resolve(library: &Library, name: &str) -> Result<Self, LoadError> {
        macro_rules! m {
            ($symbol:literal) => {
                mandatory(library, name, $symbol)?
            };
        }
        Ok(Self {
            isc_attach_database: m!("isc_attach_database"),
            isc_create_database: m!("isc_create_database"),
            isc_detach_database: m!("isc_detach_database"),
            isc_drop_database: m!("isc_drop_database"),
            isc_database_info: m!("isc_database_info"),
            isc_start_multiple: m!("isc_start_multiple"),
            isc_commit_transaction: m!("isc_commit_transaction"),
            isc_commit_retaining: m!("isc_commit_retaining"),
            isc_rollback_transaction: m!("isc_rollback_transaction"),
            isc_rollback_retaining: m!("isc_rollback_retaining"),
            isc_prepare_transaction2: m!("isc_prepare_transaction2"),
            isc_reconnect_transaction: m!("isc_reconnect_transaction"),
            isc_transaction_info: m!("isc_transaction_info"),
            isc_dsql_allocate_statement: m!("isc_dsql_allocate_statement"),
            isc_dsql_prepare: m!("isc_dsql_prepare"),
            isc_dsql_describe: m!("isc_dsql_describe"),
            isc_dsql_describe_bind: m!("isc_dsql_describe_bind"),
            isc_dsql_execute: m!("isc_dsql_execute"),
            isc_dsql_execute2: m!("isc_dsql_execute2"),
            isc_dsql_execute_immediate: m!("isc_dsql_execute_immediate"),
            isc_dsql_fetch: m!("isc_dsql_fetch"),
            isc_dsql_free_statement: m!("isc_dsql_free_statement"),
            isc_dsql_sql_info: m!("isc_dsql_sql_info"),
            isc_dsql_set_cursor_name: m!("isc_dsql_set_cursor_name"),
            isc_create_blob2: m!("isc_create_blob2"),
            isc_open_blob2: m!("isc_open_blob2"),
            isc_get_segment: m!("isc_get_segment"),
            isc_put_segment: m!("isc_put_segment"),
            isc_close_blob: m!("isc_close_blob"),
            isc_cancel_blob: m!("isc_cancel_blob"),
            isc_blob_info: m!("isc_blob_info"),
            isc_seek_blob: m!("isc_seek_blob"),
            isc_event_block: m!("isc_event_block"),
            isc_que_events: m!("isc_que_events"),
            isc_cancel_events: m!("isc_cancel_events"),
            isc_event_counts: m!("isc_event_counts"),
            isc_free: m!("isc_free"),
            isc_service_attach: m!("isc_service_attach"),
            isc_service_detach: m!("isc_service_detach"),
            isc_service_query: m!("isc_service_query"),
            isc_service_start: m!("isc_service_start"),
            fb_ping: optional(library, "fb_ping"),
            fb_cancel_operation: optional(library, "fb_cancel_operation"),
            fb_disconnect_transaction: optional(library, "fb_disconnect_transaction"),
            fb_dsql_set_timeout: optional(library, "fb_dsql_set_timeout"),
            fb_shutdown: optional(library, "fb_shutdown"),
        })
    }

    fn has(&self, entry_point: &str) -> bool {
        match entry_point {
            "fb_ping" => self.fb_ping.is_some(),
            "fb_cancel_operation" => self.fb_cancel_operation.is_some(),
            "fb_disconnect_transaction" => self.fb_disconnect_transaction.is_some(),
            "fb_dsql_set_timeout" => self.fb_dsql_set_timeout.is_some(),
            "fb_shutdown" => self.fb_shutdown.is_some(),
            _ => false,
        }
    }
}

/// A loaded client library implementing [`FbClientApi`].
///
/// After [`NativeResource::dispose`] every call fails with
/// [`FbError::LibraryDisposed`]; the OS handle is released once the last
/// in-flight call (or event block) lets go of it.
pub struct ClientLibrary {
    name: String,
    features: ClientFeatures,
    loaded: RwLock<Option<Arc<Loaded>>>,
}

impl std::fmt::Debug for ClientLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLibrary")
            .field("name", &self.name)
            .field("features", &self.features)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ClientLibrary {
    /// Loads the library at `path` (a bare name is resolved by the OS
    /// loader) and resolves its entry points.
    ///
    /// # Errors
    ///
    /// [`LoadError::NoCandidateLoaded`] if the OS loader fails and
    /// [`LoadError::MissingEntryPoint`] if a mandatory entry point is absent.
    pub fn open(path: impl AsRef<OsStr>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        // SAFETY: loading fbclient runs its initializers, which have no
        // preconditions on our side.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::NoCandidateLoaded {
            attempts: vec![crate::error::LoadAttempt {
                candidate: name.clone(),
                reason: e.to_string(),
            }],
        })?;
        let symbols = Symbols::resolve(&library, &name)?;
        let features = ClientFeatures::probe(|entry_point| symbols.has(entry_point));
        log::info!("loaded client library {name} with features {features}");
        Ok(Self {
            name,
            features,
            loaded: RwLock::new(Some(Arc::new(Loaded {
                symbols,
                _library: library,
            }))),
        })
    }

    /// Returns `true` once the library has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn loaded(&self) -> FbResult<Arc<Loaded>> {
        self.loaded
            .read()
            .map_err(|_| FbError::Poisoned("client library"))?
            .clone()
            .ok_or(FbError::LibraryDisposed)
    }
}

impl NativeResource for ClientLibrary {
    fn dispose(&self) {
        let taken = self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(loaded) = taken else {
            return;
        };
        if let Some(fb_shutdown) = loaded.symbols.fb_shutdown {
            // SAFETY: fb_shutdown takes plain integers.
            let result = unsafe { fb_shutdown(0, FB_SHUTRSN_APP_STOPPED) };
            if result != 0 {
                log::error!("fb_shutdown of {} returned {result}", self.name);
            }
        }
        log::debug!("disposed client library {}", self.name);
    }

    fn describe(&self) -> String {
        format!("client library {}", self.name)
    }
}

fn short_len(what: &'static str, len: usize) -> FbResult<c_short> {
    c_short::try_from(len).map_err(|_| FbError::LimitExceeded {
        what,
        limit: c_short::MAX as usize,
        actual: len,
    })
}

fn ushort_len(what: &'static str, len: usize) -> FbResult<c_ushort> {
    c_ushort::try_from(len).map_err(|_| FbError::LimitExceeded {
        what,
        limit: usize::from(c_ushort::MAX),
        actual: len,
    })
}

/// Length of an output buffer as a signed short; larger buffers are only
/// partially offered to the library.
fn out_len(buffer: &[u8]) -> c_short {
    buffer.len().min(c_short::MAX as usize) as c_short
}

/// Validates statement text against the length handed to the library.
fn check_text(length: u16, text: &[u8]) -> FbResult<()> {
    if length == 0 && !text.contains(&0) {
        return Err(FbError::InvalidArgument(
            "statement text without explicit length must be nul-terminated".into(),
        ));
    }
    if usize::from(length) > text.len() {
        return Err(FbError::InvalidArgument(format!(
            "statement length {length} exceeds text of {} bytes",
            text.len()
        )));
    }
    Ok(())
}

impl FbClientApi for ClientLibrary {
    fn name(&self) -> &str {
        &self.name
    }

    fn features(&self) -> &ClientFeatures {
        &self.features
    }

    fn attach_database(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        db: &mut DbHandle,
        dpb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let name_len = short_len("database name", name.len())?;
        let dpb_len = short_len("database parameter buffer", dpb.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_attach_database)(
                status.as_mut_ptr(),
                name_len,
                name.as_ptr().cast(),
                db,
                dpb_len,
                dpb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn create_database(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        db: &mut DbHandle,
        dpb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let name_len = short_len("database name", name.len())?;
        let dpb_len = short_len("database parameter buffer", dpb.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_create_database)(
                status.as_mut_ptr(),
                name_len,
                name.as_ptr().cast(),
                db,
                dpb_len,
                dpb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn detach_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_detach_database)(status.as_mut_ptr(), db) };
        Ok(())
    }

    fn drop_database(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_drop_database)(status.as_mut_ptr(), db) };
        Ok(())
    }

    fn database_info(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let items_len = short_len("info items", items.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_database_info)(
                status.as_mut_ptr(),
                db,
                items_len,
                items.as_ptr().cast(),
                out_len(buffer),
                buffer.as_mut_ptr().cast(),
            );
        }
        Ok(())
    }

    fn ping(&self, status: &mut StatusVector, db: &mut DbHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        let fb_ping = loaded
            .symbols
            .fb_ping
            .ok_or(FbError::FeatureUnavailable(ClientFeature::FbPing.entry_point()))?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { fb_ping(status.as_mut_ptr(), db) };
        Ok(())
    }

    fn cancel_operation(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        kind: u16,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let cancel = loaded.symbols.fb_cancel_operation.ok_or(FbError::FeatureUnavailable(
            ClientFeature::FbCancelOperation.entry_point(),
        ))?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { cancel(status.as_mut_ptr(), db, kind) };
        Ok(())
    }

    fn start_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        db: &mut DbHandle,
        tpb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let mut teb = IscTeb {
            db_ptr: db,
            tpb_len: c_int::try_from(tpb.len()).map_err(|_| FbError::LimitExceeded {
                what: "transaction parameter buffer",
                limit: c_int::MAX as usize,
                actual: tpb.len(),
            })?,
            tpb_ptr: tpb.as_ptr().cast(),
        };
        // SAFETY: the TEB points at a live handle and buffer for the call.
        unsafe { (loaded.symbols.isc_start_multiple)(status.as_mut_ptr(), tr, 1, &mut teb) };
        Ok(())
    }

    fn commit_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_commit_transaction)(status.as_mut_ptr(), tr) };
        Ok(())
    }

    fn commit_retaining(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_commit_retaining)(status.as_mut_ptr(), tr) };
        Ok(())
    }

    fn rollback_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_rollback_transaction)(status.as_mut_ptr(), tr) };
        Ok(())
    }

    fn rollback_retaining(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_rollback_retaining)(status.as_mut_ptr(), tr) };
        Ok(())
    }

    fn prepare_transaction(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        message: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let len = ushort_len("prepare message", message.len())?;
        let ptr = if message.is_empty() {
            std::ptr::null()
        } else {
            message.as_ptr()
        };
        // SAFETY: pointer is null or a live slice of `len` bytes.
        unsafe { (loaded.symbols.isc_prepare_transaction2)(status.as_mut_ptr(), tr, len, ptr) };
        Ok(())
    }

    fn reconnect_transaction(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        id: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let len = short_len("transaction id", id.len())?;
        // SAFETY: pointers and lengths describe live values.
        unsafe {
            (loaded.symbols.isc_reconnect_transaction)(
                status.as_mut_ptr(),
                db,
                tr,
                len,
                id.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn transaction_info(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let items_len = short_len("info items", items.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_transaction_info)(
                status.as_mut_ptr(),
                tr,
                items_len,
                items.as_ptr().cast(),
                out_len(buffer),
                buffer.as_mut_ptr().cast(),
            );
        }
        Ok(())
    }

    fn disconnect_transaction(&self, status: &mut StatusVector, tr: &mut TrHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        let disconnect = loaded.symbols.fb_disconnect_transaction.ok_or(
            FbError::FeatureUnavailable(ClientFeature::FbDisconnectTransaction.entry_point()),
        )?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { disconnect(status.as_mut_ptr(), tr) };
        Ok(())
    }

    fn dsql_allocate_statement(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        stmt: &mut StmtHandle,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointers are live `&mut`s.
        unsafe { (loaded.symbols.isc_dsql_allocate_statement)(status.as_mut_ptr(), db, stmt) };
        Ok(())
    }

    fn dsql_prepare(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        length: u16,
        text: &[u8],
        dialect: u16,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        check_text(length, text)?;
        let loaded = self.loaded()?;
        // SAFETY: `check_text` guarantees the library reads inside `text`.
        unsafe {
            (loaded.symbols.isc_dsql_prepare)(
                status.as_mut_ptr(),
                tr,
                stmt,
                length,
                text.as_ptr().cast(),
                dialect,
                sqlda.as_mut_ptr(),
            );
        }
        Ok(())
    }

    fn dsql_describe(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: the descriptor is a valid XSQLDA with `sqln` slots.
        unsafe {
            (loaded.symbols.isc_dsql_describe)(
                status.as_mut_ptr(),
                stmt,
                crate::consts::SQLDA_VERSION1,
                sqlda.as_mut_ptr(),
            );
        }
        Ok(())
    }

    fn dsql_describe_bind(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        sqlda: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: the descriptor is a valid XSQLDA with `sqln` slots.
        unsafe {
            (loaded.symbols.isc_dsql_describe_bind)(
                status.as_mut_ptr(),
                stmt,
                crate::consts::SQLDA_VERSION1,
                sqlda.as_mut_ptr(),
            );
        }
        Ok(())
    }

    fn dsql_execute(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        input: &XsqldaBuffer,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: the descriptor and its data buffers are alive for the call.
        unsafe {
            (loaded.symbols.isc_dsql_execute)(
                status.as_mut_ptr(),
                tr,
                stmt,
                crate::consts::SQLDA_VERSION1,
                input.as_ptr(),
            );
        }
        Ok(())
    }

    fn dsql_execute2(
        &self,
        status: &mut StatusVector,
        tr: &mut TrHandle,
        stmt: &mut StmtHandle,
        input: &XsqldaBuffer,
        output: &mut XsqldaBuffer,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: both descriptors and their data buffers are alive for the
        // call; `output` is exclusively borrowed.
        unsafe {
            (loaded.symbols.isc_dsql_execute2)(
                status.as_mut_ptr(),
                tr,
                stmt,
                crate::consts::SQLDA_VERSION1,
                input.as_ptr(),
                output.as_mut_ptr(),
            );
        }
        Ok(())
    }

    fn dsql_execute_immediate(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        length: u16,
        text: &[u8],
        dialect: u16,
        input: Option<&XsqldaBuffer>,
    ) -> FbResult<()> {
        check_text(length, text)?;
        let loaded = self.loaded()?;
        let input = input.map_or(std::ptr::null(), XsqldaBuffer::as_ptr);
        // SAFETY: `check_text` guarantees the library reads inside `text`.
        unsafe {
            (loaded.symbols.isc_dsql_execute_immediate)(
                status.as_mut_ptr(),
                db,
                tr,
                length,
                text.as_ptr().cast(),
                dialect,
                input,
            );
        }
        Ok(())
    }

    fn dsql_fetch(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        output: &mut XsqldaBuffer,
    ) -> FbResult<IscStatus> {
        let loaded = self.loaded()?;
        // SAFETY: the descriptor is exclusively borrowed for the call.
        let result = unsafe {
            (loaded.symbols.isc_dsql_fetch)(
                status.as_mut_ptr(),
                stmt,
                crate::consts::SQLDA_VERSION1,
                output.as_mut_ptr(),
            )
        };
        Ok(result)
    }

    fn dsql_free_statement(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        option: u16,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_dsql_free_statement)(status.as_mut_ptr(), stmt, option) };
        Ok(())
    }

    fn dsql_sql_info(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let items_len = short_len("info items", items.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_dsql_sql_info)(
                status.as_mut_ptr(),
                stmt,
                items_len,
                items.as_ptr().cast(),
                out_len(buffer),
                buffer.as_mut_ptr().cast(),
            );
        }
        Ok(())
    }

    fn dsql_set_cursor_name(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        name: &CStr,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: `name` is nul-terminated.
        unsafe {
            (loaded.symbols.isc_dsql_set_cursor_name)(status.as_mut_ptr(), stmt, name.as_ptr(), 0);
        }
        Ok(())
    }

    fn dsql_set_timeout(
        &self,
        status: &mut StatusVector,
        stmt: &mut StmtHandle,
        timeout_ms: u32,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let set_timeout = loaded.symbols.fb_dsql_set_timeout.ok_or(
            FbError::FeatureUnavailable(ClientFeature::StatementTimeout.entry_point()),
        )?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { set_timeout(status.as_mut_ptr(), stmt, c_uint::from(timeout_ms)) };
        Ok(())
    }

    fn create_blob(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        bpb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let bpb_len = short_len("blob parameter buffer", bpb.len())?;
        // SAFETY: pointers and lengths describe live values.
        unsafe {
            (loaded.symbols.isc_create_blob2)(
                status.as_mut_ptr(),
                db,
                tr,
                blob,
                id,
                bpb_len,
                bpb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn open_blob(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        tr: &mut TrHandle,
        blob: &mut BlobHandle,
        id: &mut IscQuad,
        bpb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let bpb_len = short_len("blob parameter buffer", bpb.len())?;
        // SAFETY: pointers and lengths describe live values.
        unsafe {
            (loaded.symbols.isc_open_blob2)(
                status.as_mut_ptr(),
                db,
                tr,
                blob,
                id,
                bpb_len,
                bpb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn get_segment(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        buffer: &mut [u8],
    ) -> FbResult<usize> {
        let loaded = self.loaded()?;
        let capacity = buffer.len().min(usize::from(c_ushort::MAX)) as c_ushort;
        let mut actual: c_ushort = 0;
        // SAFETY: the library writes at most `capacity` bytes into `buffer`.
        unsafe {
            (loaded.symbols.isc_get_segment)(
                status.as_mut_ptr(),
                blob,
                &mut actual,
                capacity,
                buffer.as_mut_ptr().cast::<c_char>(),
            );
        }
        Ok(usize::from(actual).min(buffer.len()))
    }

    fn put_segment(&self, status: &mut StatusVector, blob: &mut BlobHandle, data: &[u8]) -> FbResult<()> {
        let loaded = self.loaded()?;
        let len = ushort_len("blob segment", data.len())?;
        // SAFETY: pointer and length describe a live slice.
        unsafe {
            (loaded.symbols.isc_put_segment)(status.as_mut_ptr(), blob, len, data.as_ptr().cast());
        }
        Ok(())
    }

    fn close_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_close_blob)(status.as_mut_ptr(), blob) };
        Ok(())
    }

    fn cancel_blob(&self, status: &mut StatusVector, blob: &mut BlobHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_cancel_blob)(status.as_mut_ptr(), blob) };
        Ok(())
    }

    fn blob_info(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        items: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let items_len = short_len("info items", items.len())?;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_blob_info)(
                status.as_mut_ptr(),
                blob,
                items_len,
                items.as_ptr().cast(),
                out_len(buffer),
                buffer.as_mut_ptr().cast(),
            );
        }
        Ok(())
    }

    fn seek_blob(
        &self,
        status: &mut StatusVector,
        blob: &mut BlobHandle,
        mode: i16,
        offset: i32,
    ) -> FbResult<i32> {
        let loaded = self.loaded()?;
        let mut position: c_int = 0;
        // SAFETY: out pointer is a live local.
        unsafe {
            (loaded.symbols.isc_seek_blob)(status.as_mut_ptr(), blob, mode, offset, &mut position);
        }
        Ok(position)
    }

    fn event_block(&self, event_name: &CStr) -> FbResult<Arc<EventBlock>> {
        let loaded = self.loaded()?;
        let mut event: *mut u8 = std::ptr::null_mut();
        let mut result: *mut u8 = std::ptr::null_mut();
        // SAFETY: one nul-terminated name for a count of one.
        let length = unsafe {
            (loaded.symbols.isc_event_block)(&mut event, &mut result, 1, event_name.as_ptr())
        };
        let Ok(length) = usize::try_from(length) else {
            return Err(FbError::illegal_state("isc_event_block returned a negative size"));
        };
        if event.is_null() || result.is_null() || length == 0 {
            return Err(FbError::illegal_state("isc_event_block did not allocate buffers"));
        }
        let free = loaded.symbols.isc_free;
        let keep_alive: Arc<dyn Any + Send + Sync> = loaded;
        // SAFETY: buffers were just allocated by this library.
        Ok(Arc::new(unsafe {
            EventBlock::native(event, result, length, free, keep_alive)
        }))
    }

    fn que_events(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        event_id: &mut i32,
        block: &Arc<EventBlock>,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let length = short_len("event buffer", block.len())?;
        let event_ptr = block
            .event_ptr()
            .ok_or_else(|| FbError::illegal_state("event block has been released"))?;
        let arg = block.callback_arg();
        // SAFETY: `arg` carries its own reference to the block, reclaimed by
        // the trampoline or below when queueing fails.
        unsafe {
            (loaded.symbols.isc_que_events)(
                status.as_mut_ptr(),
                db,
                event_id,
                length,
                event_ptr,
                event_trampoline,
                arg,
            );
        }
        if status.has_error() {
            // SAFETY: the library rejected the registration; the callback
            // will never run.
            unsafe { reclaim_callback_arg(arg) };
        }
        Ok(())
    }

    fn cancel_events(
        &self,
        status: &mut StatusVector,
        db: &mut DbHandle,
        event_id: &mut i32,
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: pointers are live `&mut`s.
        unsafe { (loaded.symbols.isc_cancel_events)(status.as_mut_ptr(), db, event_id) };
        Ok(())
    }

    fn event_counts(&self, block: &EventBlock) -> FbResult<u32> {
        let loaded = self.loaded()?;
        let length = short_len("event buffer", block.len())?;
        block
            .with_buffers(|event, result| {
                let mut counts = [0 as c_uint; STATUS_VECTOR_SIZE];
                // SAFETY: both buffers are `length` bytes and borrowed for
                // the call.
                unsafe {
                    (loaded.symbols.isc_event_counts)(
                        counts.as_mut_ptr(),
                        length,
                        event.as_mut_ptr(),
                        result.as_ptr(),
                    );
                }
                counts[0]
            })
            .ok_or_else(|| FbError::illegal_state("event block has been released"))
    }

    fn service_attach(
        &self,
        status: &mut StatusVector,
        name: &[u8],
        svc: &mut SvcHandle,
        spb: &[u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let name_len = ushort_len("service name", name.len())?;
        let spb_len = ushort_len("service parameter buffer", spb.len())?;
        // SAFETY: pointers and lengths describe live values.
        unsafe {
            (loaded.symbols.isc_service_attach)(
                status.as_mut_ptr(),
                name_len,
                name.as_ptr().cast(),
                svc,
                spb_len,
                spb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn service_detach(&self, status: &mut StatusVector, svc: &mut SvcHandle) -> FbResult<()> {
        let loaded = self.loaded()?;
        // SAFETY: handle pointer is a live `&mut`.
        unsafe { (loaded.symbols.isc_service_detach)(status.as_mut_ptr(), svc) };
        Ok(())
    }

    fn service_query(
        &self,
        status: &mut StatusVector,
        svc: &mut SvcHandle,
        send: &[u8],
        request: &[u8],
        buffer: &mut [u8],
    ) -> FbResult<()> {
        let loaded = self.loaded()?;
        let send_len = ushort_len("service query send items", send.len())?;
        let request_len = ushort_len("service query request items", request.len())?;
        let buffer_len = buffer.len().min(usize::from(c_ushort::MAX)) as c_ushort;
        let mut reserved: ApiHandle = 0;
        // SAFETY: pointers and lengths describe live slices.
        unsafe {
            (loaded.symbols.isc_service_query)(
                status.as_mut_ptr(),
                svc,
                &mut reserved,
                send_len,
                send.as_ptr().cast(),
                request_len,
                request.as_ptr().cast(),
                buffer_len,
                buffer.as_mut_ptr().cast(),
            );
        }
        Ok(())
    }

    fn service_start(&self, status: &mut StatusVector, svc: &mut SvcHandle, spb: &[u8]) -> FbResult<()> {
        let loaded = self.loaded()?;
        let spb_len = ushort_len("service parameter buffer", spb.len())?;
        let mut reserved: ApiHandle = 0;
        // SAFETY: pointers and lengths describe live values.
        unsafe {
            (loaded.symbols.isc_service_start)(
                status.as_mut_ptr(),
                svc,
                &mut reserved,
                spb_len,
                spb.as_ptr().cast(),
            );
        }
        Ok(())
    }

    fn shutdown(&self, timeout_ms: u32, reason: i32) -> FbResult<i32> {
        let loaded = self.loaded()?;
        let fb_shutdown = loaded
            .symbols
            .fb_shutdown
            .ok_or(FbError::FeatureUnavailable(ClientFeature::FbShutdown.entry_point()))?;
        // SAFETY: plain integer arguments.
        Ok(unsafe { fb_shutdown(c_uint::from(timeout_ms), reason) })
    }
}
