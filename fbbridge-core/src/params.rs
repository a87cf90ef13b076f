//! Tagged parameter buffers (DPB, SPB, TPB, BPB).
//!
//! All four share one layout: a version byte (two for service attach)
//! followed by items. Database, service and blob items are
//! `tag, length, value`; transaction items are bare tags.

use strum::Display;

use crate::config::{ConnectionProperties, ServiceProperties, WireCrypt};
use crate::consts::{
    ISC_BPB_TARGET_TYPE, ISC_BPB_TYPE, ISC_BPB_TYPE_SEGMENTED, ISC_BPB_TYPE_STREAM,
    ISC_BPB_VERSION1, ISC_DPB_CONFIG, ISC_DPB_CONNECT_TIMEOUT, ISC_DPB_LC_CTYPE,
    ISC_DPB_PASSWORD, ISC_DPB_PROCESS_ID, ISC_DPB_PROCESS_NAME, ISC_DPB_SQL_DIALECT,
    ISC_DPB_SQL_ROLE_NAME, ISC_DPB_USER_NAME, ISC_DPB_UTF8_FILENAME, ISC_DPB_VERSION1,
    ISC_SPB_CONFIG, ISC_SPB_CURRENT_VERSION, ISC_SPB_PASSWORD, ISC_SPB_SQL_ROLE_NAME,
    ISC_SPB_USER_NAME, ISC_SPB_VERSION, ISC_TPB_CONCURRENCY, ISC_TPB_CONSISTENCY,
    ISC_TPB_NOWAIT, ISC_TPB_READ, ISC_TPB_READ_COMMITTED, ISC_TPB_REC_VERSION,
    ISC_TPB_VERSION3, ISC_TPB_WAIT, ISC_TPB_WRITE,
};
use crate::error::{FbError, FbResult};

/// Longest value a one-byte length item can carry.
pub const MAX_ITEM_LENGTH: usize = u8::MAX as usize;

/// Which kind of parameter buffer a [`ParameterBuffer`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ParameterBufferKind {
    /// Database parameter buffer.
    #[strum(serialize = "DPB")]
    Database,
    /// Service attach parameter buffer.
    #[strum(serialize = "SPB")]
    Service,
    /// Transaction parameter buffer.
    #[strum(serialize = "TPB")]
    Transaction,
    /// Blob parameter buffer.
    #[strum(serialize = "BPB")]
    Blob,
}

/// A parameter buffer under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBuffer {
    kind: ParameterBufferKind,
    bytes: Vec<u8>,
}

impl ParameterBuffer {
    /// Empty DPB (`isc_dpb_version1`).
    #[must_use]
    pub fn database() -> Self {
        Self::with_header(ParameterBufferKind::Database, &[ISC_DPB_VERSION1])
    }

    /// Empty service attach SPB (`isc_spb_version`, `isc_spb_current_version`).
    #[must_use]
    pub fn service() -> Self {
        Self::with_header(
            ParameterBufferKind::Service,
            &[ISC_SPB_VERSION, ISC_SPB_CURRENT_VERSION],
        )
    }

    /// Empty TPB (`isc_tpb_version3`).
    #[must_use]
    pub fn transaction() -> Self {
        Self::with_header(ParameterBufferKind::Transaction, &[ISC_TPB_VERSION3])
    }

    /// Empty BPB (`isc_bpb_version1`).
    #[must_use]
    pub fn blob() -> Self {
        Self::with_header(ParameterBufferKind::Blob, &[ISC_BPB_VERSION1])
    }

    fn with_header(kind: ParameterBufferKind, header: &[u8]) -> Self {
        Self {
            kind,
            bytes: header.to_vec(),
        }
    }

    /// Kind of buffer.
    #[must_use]
    pub const fn kind(&self) -> ParameterBufferKind {
        self.kind
    }

    /// Appends a bare tag.
    pub fn add_tag(&mut self, tag: u8) -> &mut Self {
        self.bytes.push(tag);
        self
    }

    /// Appends `tag` with a zero length and no value.
    pub fn add_empty(&mut self, tag: u8) -> &mut Self {
        self.bytes.extend_from_slice(&[tag, 0]);
        self
    }

    /// Appends `tag` followed by a one-byte length and `value`.
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if `value` is longer than 255 bytes.
    pub fn add_bytes(&mut self, tag: u8, value: &[u8]) -> FbResult<&mut Self> {
        let length = u8::try_from(value.len()).map_err(|_| FbError::LimitExceeded {
            what: "parameter buffer item",
            limit: MAX_ITEM_LENGTH,
            actual: value.len(),
        })?;
        self.bytes.push(tag);
        self.bytes.push(length);
        self.bytes.extend_from_slice(value);
        Ok(self)
    }

    /// Appends a UTF-8 string item.
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if `value` is longer than 255 bytes.
    pub fn add_string(&mut self, tag: u8, value: &str) -> FbResult<&mut Self> {
        self.add_bytes(tag, value.as_bytes())
    }

    /// Appends a 4-byte little-endian integer item.
    pub fn add_int(&mut self, tag: u8, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&[tag, 4]);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a 2-byte little-endian integer item.
    pub fn add_short(&mut self, tag: u8, value: i16) -> &mut Self {
        self.bytes.extend_from_slice(&[tag, 2]);
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Appends a 1-byte integer item.
    pub fn add_byte(&mut self, tag: u8, value: u8) -> &mut Self {
        self.bytes.extend_from_slice(&[tag, 1, value]);
        self
    }

    /// Raw bytes, header included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `true` if at least one item follows the header.
    #[must_use]
    pub fn has_items(&self) -> bool {
        let header = match self.kind {
            ParameterBufferKind::Service => 2,
            _ => 1,
        };
        self.bytes.len() > header
    }

    /// DPB for attaching or creating a database with `props`.
    ///
    /// Strings are sent as UTF-8 and flagged with `isc_dpb_utf8_filename`.
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if a string property is longer than 255
    /// bytes.
    pub fn for_connection(props: &ConnectionProperties) -> FbResult<Self> {
        let mut dpb = Self::database();
        dpb.add_string(ISC_DPB_LC_CTYPE, props.encoding.charset_name())?;
        dpb.add_int(ISC_DPB_SQL_DIALECT, i32::from(props.sql_dialect));
        if let Some(user) = &props.user {
            dpb.add_string(ISC_DPB_USER_NAME, user)?;
        }
        if let Some(password) = &props.password {
            dpb.add_string(ISC_DPB_PASSWORD, password)?;
        }
        if let Some(role) = &props.role_name {
            dpb.add_string(ISC_DPB_SQL_ROLE_NAME, role)?;
        }
        if let Some(timeout) = props.connect_timeout {
            dpb.add_int(ISC_DPB_CONNECT_TIMEOUT, i32::try_from(timeout).unwrap_or(i32::MAX));
        }
        if let Some(name) = &props.process_name {
            dpb.add_string(ISC_DPB_PROCESS_NAME, name)?;
        }
        if let Some(pid) = props.process_id {
            dpb.add_int(ISC_DPB_PROCESS_ID, pid as i32);
        }
        dpb.add_empty(ISC_DPB_UTF8_FILENAME);
        if let Some(config) = config_string(props.wire_crypt, props.auth_plugins.as_deref()) {
            dpb.add_string(ISC_DPB_CONFIG, &config)?;
        }
        Ok(dpb)
    }

    /// SPB for attaching to the service manager with `props`.
    ///
    /// # Errors
    ///
    /// [`FbError::LimitExceeded`] if a string property is longer than 255
    /// bytes.
    pub fn for_service(props: &ServiceProperties) -> FbResult<Self> {
        let mut spb = Self::service();
        if let Some(user) = &props.user {
            spb.add_string(ISC_SPB_USER_NAME, user)?;
        }
        if let Some(password) = &props.password {
            spb.add_string(ISC_SPB_PASSWORD, password)?;
        }
        if let Some(role) = &props.role_name {
            spb.add_string(ISC_SPB_SQL_ROLE_NAME, role)?;
        }
        if let Some(config) = config_string(props.wire_crypt, props.auth_plugins.as_deref()) {
            spb.add_string(ISC_SPB_CONFIG, &config)?;
        }
        Ok(spb)
    }

    /// Read-write, read committed with record versions, waiting on
    /// conflicts.
    #[must_use]
    pub fn read_committed() -> Self {
        Self::transaction_with(&[
            ISC_TPB_WRITE,
            ISC_TPB_READ_COMMITTED,
            ISC_TPB_REC_VERSION,
            ISC_TPB_WAIT,
        ])
    }

    /// Read-write snapshot, waiting on conflicts.
    #[must_use]
    pub fn concurrency() -> Self {
        Self::transaction_with(&[ISC_TPB_WRITE, ISC_TPB_CONCURRENCY, ISC_TPB_WAIT])
    }

    /// Read-write table-stability snapshot, waiting on conflicts.
    #[must_use]
    pub fn consistency() -> Self {
        Self::transaction_with(&[ISC_TPB_WRITE, ISC_TPB_CONSISTENCY, ISC_TPB_WAIT])
    }

    /// Read-only read committed, failing immediately on conflicts.
    #[must_use]
    pub fn read_only() -> Self {
        Self::transaction_with(&[
            ISC_TPB_READ,
            ISC_TPB_READ_COMMITTED,
            ISC_TPB_REC_VERSION,
            ISC_TPB_NOWAIT,
        ])
    }

    fn transaction_with(tags: &[u8]) -> Self {
        let mut tpb = Self::transaction();
        for tag in tags {
            tpb.add_tag(*tag);
        }
        tpb
    }

    /// BPB selecting the blob `sub_type` and, when `stream` is set, stream
    /// instead of segmented storage.
    #[must_use]
    pub fn blob_with(sub_type: Option<i16>, stream: bool) -> Self {
        let mut bpb = Self::blob();
        if let Some(sub_type) = sub_type {
            bpb.add_short(ISC_BPB_TARGET_TYPE, sub_type);
        }
        bpb.add_byte(
            ISC_BPB_TYPE,
            if stream {
                ISC_BPB_TYPE_STREAM
            } else {
                ISC_BPB_TYPE_SEGMENTED
            },
        );
        bpb
    }
}

/// Builds the `Key=Value` config string forwarded through
/// `isc_dpb_config` / `isc_spb_config`, entries separated by `\n`. Returns
/// `None` when there is nothing to forward.
#[must_use]
pub fn config_string(wire_crypt: WireCrypt, auth_plugins: Option<&str>) -> Option<String> {
    let entries: Vec<String> = wire_crypt
        .config_value()
        .map(|value| format!("WireCrypt={value}"))
        .into_iter()
        .chain(
            auth_plugins
                .map(str::trim)
                .filter(|plugins| !plugins.is_empty())
                .map(|plugins| format!("AuthClient={plugins}")),
        )
        .collect();
    if entries.is_empty() {
        None
    } else {
        Some(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(WireCrypt::Default, None, None)]
    #[test_case(WireCrypt::Required, None, Some("WireCrypt=Required"))]
    #[test_case(WireCrypt::Default, Some("Srp256,Srp"), Some("AuthClient=Srp256,Srp"))]
    #[test_case(WireCrypt::Disabled, Some("Legacy_Auth"), Some("WireCrypt=Disabled\nAuthClient=Legacy_Auth"))]
    #[test_case(WireCrypt::Enabled, Some("  "), Some("WireCrypt=Enabled"))]
    fn config_strings(wire_crypt: WireCrypt, plugins: Option<&str>, expected: Option<&str>) {
        assert_eq!(config_string(wire_crypt, plugins).as_deref(), expected);
    }

    #[test]
    fn dpb_layout() {
        let props = ConnectionProperties::new("employee").with_credentials("SYSDBA", "pw");
        let dpb = ParameterBuffer::for_connection(&props).unwrap();
        let mut expected = vec![ISC_DPB_VERSION1, ISC_DPB_LC_CTYPE, 4];
        expected.extend_from_slice(b"UTF8");
        expected.extend_from_slice(&[ISC_DPB_SQL_DIALECT, 4, 3, 0, 0, 0]);
        expected.extend_from_slice(&[ISC_DPB_USER_NAME, 6]);
        expected.extend_from_slice(b"SYSDBA");
        expected.extend_from_slice(&[ISC_DPB_PASSWORD, 2]);
        expected.extend_from_slice(b"pw");
        expected.extend_from_slice(&[ISC_DPB_UTF8_FILENAME, 0]);
        assert_eq!(dpb.as_bytes(), expected.as_slice());
        assert_eq!(dpb.kind().to_string(), "DPB");
    }

    #[test]
    fn dpb_carries_config_string() {
        let props = ConnectionProperties {
            wire_crypt: WireCrypt::Required,
            ..ConnectionProperties::new("employee")
        };
        let dpb = ParameterBuffer::for_connection(&props).unwrap();
        let tail = [&[ISC_DPB_CONFIG, 18][..], &b"WireCrypt=Required"[..]].concat();
        assert!(dpb.as_bytes().ends_with(&tail));
    }

    #[test]
    fn overlong_string_is_rejected() {
        let mut dpb = ParameterBuffer::database();
        let err = dpb.add_string(ISC_DPB_USER_NAME, &"u".repeat(256)).unwrap_err();
        assert!(matches!(err, FbError::LimitExceeded { limit: 255, actual: 256, .. }));
        assert!(!dpb.has_items());
        assert!(dpb.add_string(ISC_DPB_USER_NAME, &"u".repeat(255)).is_ok());
    }

    #[test]
    fn spb_has_two_byte_header() {
        let props = ServiceProperties {
            user: Some("SYSDBA".into()),
            ..ServiceProperties::default()
        };
        let spb = ParameterBuffer::for_service(&props).unwrap();
        assert_eq!(&spb.as_bytes()[..4], &[ISC_SPB_VERSION, ISC_SPB_CURRENT_VERSION, ISC_SPB_USER_NAME, 6]);
        assert!(!ParameterBuffer::service().has_items());
    }

    #[test]
    fn tpb_presets() {
        assert_eq!(
            ParameterBuffer::read_committed().as_bytes(),
            &[ISC_TPB_VERSION3, ISC_TPB_WRITE, ISC_TPB_READ_COMMITTED, ISC_TPB_REC_VERSION, ISC_TPB_WAIT]
        );
        assert_eq!(
            ParameterBuffer::concurrency().as_bytes(),
            &[ISC_TPB_VERSION3, ISC_TPB_WRITE, ISC_TPB_CONCURRENCY, ISC_TPB_WAIT]
        );
        assert_eq!(ParameterBuffer::read_only().as_bytes()[1], ISC_TPB_READ);
        assert_eq!(ParameterBuffer::consistency().as_bytes()[2], ISC_TPB_CONSISTENCY);
    }

    #[test]
    fn bpb_sub_type_and_storage() {
        let bpb = ParameterBuffer::blob_with(Some(1), true);
        assert_eq!(
            bpb.as_bytes(),
            &[ISC_BPB_VERSION1, ISC_BPB_TARGET_TYPE, 2, 1, 0, ISC_BPB_TYPE, 1, ISC_BPB_TYPE_STREAM]
        );
    }
}
