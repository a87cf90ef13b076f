//! Connection and service properties.
//!
//! These are supplied by the caller (or deserialized from a host
//! configuration file) and turned into attach strings and parameter
//! buffers by [`crate::factory`] and [`crate::params`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::encoding::Encoding;

/// Default Firebird port.
pub const DEFAULT_PORT: u16 = 3050;
/// Default SQL dialect.
pub const DEFAULT_DIALECT: u16 = 3;
/// Default blob buffer size in bytes.
pub const DEFAULT_BLOB_BUFFER_SIZE: usize = 16 * 1024;
/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "service_mgr";

/// Wire encryption preference forwarded to the client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum WireCrypt {
    /// Leave the client library's own default in place.
    #[default]
    Default,
    /// Refuse unencrypted connections.
    Required,
    /// Encrypt if the server agrees.
    Enabled,
    /// Never encrypt.
    Disabled,
}

impl WireCrypt {
    /// Value for the `WireCrypt` entry of the config string; `None` for
    /// [`WireCrypt::Default`].
    #[must_use]
    pub const fn config_value(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Required => Some("Required"),
            Self::Enabled => Some("Enabled"),
            Self::Disabled => Some("Disabled"),
        }
    }
}

/// Properties shared by database and service connections that decide
/// where and through which library to attach.
pub trait AttachProperties {
    /// Server host name or address; `None` for local access.
    fn server_name(&self) -> Option<&str>;
    /// Server port.
    fn port_number(&self) -> u16;
    /// One-shot search path for the native library.
    fn native_library_path(&self) -> Option<&Path>;
    /// Connection character set.
    fn encoding(&self) -> Encoding;
}

/// Properties of a database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionProperties {
    /// Server host name or address; `None` for local access.
    pub server_name: Option<String>,
    /// Server port.
    pub port_number: u16,
    /// Database path or alias.
    pub database_name: String,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// SQL role.
    pub role_name: Option<String>,
    /// Connection character set, sent as `isc_dpb_lc_ctype`.
    pub encoding: Encoding,
    /// SQL dialect.
    pub sql_dialect: u16,
    /// Directory to search for the client library. Only honoured by the
    /// first successful load of a factory; see
    /// [`DatabaseFactory`](crate::factory::DatabaseFactory).
    pub native_library_path: Option<PathBuf>,
    /// Wire encryption preference.
    pub wire_crypt: WireCrypt,
    /// Comma separated list of client authentication plugins.
    pub auth_plugins: Option<String>,
    /// Size of the scratch buffer used for blob writes.
    pub blob_buffer_size: usize,
    /// Connect timeout in seconds.
    pub connect_timeout: Option<u32>,
    /// Process name reported to the server.
    pub process_name: Option<String>,
    /// Process id reported to the server.
    pub process_id: Option<u32>,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            server_name: None,
            port_number: DEFAULT_PORT,
            database_name: String::new(),
            user: None,
            password: None,
            role_name: None,
            encoding: Encoding::default(),
            sql_dialect: DEFAULT_DIALECT,
            native_library_path: None,
            wire_crypt: WireCrypt::default(),
            auth_plugins: None,
            blob_buffer_size: DEFAULT_BLOB_BUFFER_SIZE,
            connect_timeout: None,
            process_name: None,
            process_id: None,
        }
    }
}

impl ConnectionProperties {
    /// Properties for `database_name` with every other value defaulted.
    #[must_use]
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Sets the server name.
    #[must_use]
    pub fn with_server(mut self, server_name: impl Into<String>, port_number: u16) -> Self {
        self.server_name = Some(server_name.into());
        self.port_number = port_number;
        self
    }

    /// Sets user and password.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }
}

impl AttachProperties for ConnectionProperties {
    fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    fn port_number(&self) -> u16 {
        self.port_number
    }

    fn native_library_path(&self) -> Option<&Path> {
        self.native_library_path.as_deref()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// Properties of a service manager connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceProperties {
    /// Server host name or address; `None` for local access.
    pub server_name: Option<String>,
    /// Server port.
    pub port_number: u16,
    /// Service name; [`DEFAULT_SERVICE_NAME`] when empty.
    pub service_name: Option<String>,
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// SQL role.
    pub role_name: Option<String>,
    /// Connection character set.
    pub encoding: Encoding,
    /// Directory to search for the client library.
    pub native_library_path: Option<PathBuf>,
    /// Wire encryption preference.
    pub wire_crypt: WireCrypt,
    /// Comma separated list of client authentication plugins.
    pub auth_plugins: Option<String>,
}

impl Default for ServiceProperties {
    fn default() -> Self {
        Self {
            server_name: None,
            port_number: DEFAULT_PORT,
            service_name: None,
            user: None,
            password: None,
            role_name: None,
            encoding: Encoding::default(),
            native_library_path: None,
            wire_crypt: WireCrypt::default(),
            auth_plugins: None,
        }
    }
}

impl ServiceProperties {
    /// Effective service name.
    #[must_use]
    pub fn effective_service_name(&self) -> &str {
        match self.service_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_SERVICE_NAME,
        }
    }
}

impl AttachProperties for ServiceProperties {
    fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    fn port_number(&self) -> u16 {
        self.port_number
    }

    fn native_library_path(&self) -> Option<&Path> {
        self.native_library_path.as_deref()
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn connection_defaults() {
        let props = ConnectionProperties::new("employee");
        assert_eq!(props.port_number, 3050);
        assert_eq!(props.sql_dialect, 3);
        assert_eq!(props.blob_buffer_size, 16384);
        assert_eq!(props.encoding, Encoding::Utf8);
        assert_eq!(props.wire_crypt, WireCrypt::Default);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let props: ConnectionProperties = serde_json::from_str(
            r#"{"serverName":"db.local","databaseName":"/data/app.fdb","encoding":"ISO8859_1","wireCrypt":"required"}"#,
        )
        .unwrap();
        assert_eq!(props.server_name.as_deref(), Some("db.local"));
        assert_eq!(props.port_number, DEFAULT_PORT);
        assert_eq!(props.encoding, Encoding::Latin1);
        assert_eq!(props.wire_crypt, WireCrypt::Required);
    }

    #[test_case(None, "service_mgr")]
    #[test_case(Some(""), "service_mgr")]
    #[test_case(Some("other_mgr"), "other_mgr")]
    fn service_name_fallback(name: Option<&str>, expected: &str) {
        let props = ServiceProperties {
            service_name: name.map(str::to_string),
            ..ServiceProperties::default()
        };
        assert_eq!(props.effective_service_name(), expected);
    }

    #[test_case(WireCrypt::Default, None)]
    #[test_case(WireCrypt::Required, Some("Required"))]
    #[test_case(WireCrypt::Disabled, Some("Disabled"))]
    fn wire_crypt_config_values(value: WireCrypt, expected: Option<&str>) {
        assert_eq!(value.config_value(), expected);
    }
}
