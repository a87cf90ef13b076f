//! Connection character sets supported by the bridge.

use serde::{Deserialize, Serialize};

use crate::error::{FbError, FbResult};

/// Character set used for attach strings, statement text, names and status
/// vector strings of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Encoding {
    /// `UTF8`.
    #[default]
    Utf8,
    /// `NONE`: bytes are passed through; text is treated as UTF-8.
    None,
    /// `OCTETS`: binary, text is treated as UTF-8.
    Octets,
    /// `ASCII`.
    Ascii,
    /// `ISO8859_1`.
    #[serde(rename = "ISO8859_1")]
    Latin1,
}

impl Encoding {
    /// Resolves a Firebird character set name (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`FbError::UnsupportedEncoding`] for unknown names.
    pub fn from_charset(name: &str) -> FbResult<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "UTF8" | "UTF-8" => Ok(Self::Utf8),
            "NONE" => Ok(Self::None),
            "OCTETS" | "BINARY" => Ok(Self::Octets),
            "ASCII" => Ok(Self::Ascii),
            "ISO8859_1" | "LATIN1" | "ISO-8859-1" => Ok(Self::Latin1),
            _ => Err(FbError::UnsupportedEncoding(name.to_string())),
        }
    }

    /// Firebird name of the character set, as sent in `isc_dpb_lc_ctype`.
    #[must_use]
    pub const fn charset_name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF8",
            Self::None => "NONE",
            Self::Octets => "OCTETS",
            Self::Ascii => "ASCII",
            Self::Latin1 => "ISO8859_1",
        }
    }

    /// Encodes `text` for the native library.
    ///
    /// # Errors
    ///
    /// [`FbError::InvalidArgument`] if `text` has characters the character
    /// set cannot represent.
    pub fn encode(self, text: &str) -> FbResult<Vec<u8>> {
        match self {
            Self::Utf8 | Self::None | Self::Octets => Ok(text.as_bytes().to_vec()),
            Self::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(FbError::InvalidArgument(format!(
                        "text cannot be represented in ASCII: {text:?}"
                    )))
                }
            }
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        FbError::InvalidArgument(format!(
                            "character {c:?} cannot be represented in ISO8859_1"
                        ))
                    })
                })
                .collect(),
        }
    }

    /// Decodes bytes received from the native library. Invalid sequences
    /// are replaced, never rejected.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 | Self::None | Self::Octets | Self::Ascii => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            Self::Latin1 => bytes.iter().map(|b| char::from(*b)).collect(),
        }
    }
}
