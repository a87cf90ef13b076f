//! Error types for the native client bridge.

use std::fmt;

use thiserror::Error;

/// Result type for bridge operations.
pub type FbResult<T> = Result<T, FbError>;

/// Positional message parameter carried by a status vector entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParameter {
    /// String argument (`isc_arg_string`, `isc_arg_interpreted`, `isc_arg_cstring`).
    Text(String),
    /// Numeric argument (`isc_arg_number` and unrecognized tags).
    Integer(i64),
}

impl fmt::Display for MessageParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Integer(i) => write!(f, "{i}"),
        }
    }
}

/// Whether a status vector entry was reported as an error or a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// `isc_arg_gds`.
    Error,
    /// `isc_arg_warning`.
    Warning,
}

/// One error or warning code with the parameters that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Firebird (GDS) error code.
    pub code: i32,
    /// Error or warning.
    pub kind: StatusKind,
    /// Parameters in vector order.
    pub parameters: Vec<MessageParameter>,
}

impl StatusEntry {
    pub(crate) const fn new(code: i32, kind: StatusKind) -> Self {
        Self {
            code,
            kind,
            parameters: Vec::new(),
        }
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, entry: &StatusEntry) -> fmt::Result {
    write!(f, "{}", entry.code)?;
    if !entry.parameters.is_empty() {
        write!(f, " [")?;
        for (i, p) in entry.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "]")?;
    }
    Ok(())
}

/// Structured error decoded from a status vector (or raised locally with a
/// Firebird error code).
///
/// The first entry is the primary error; the remaining entries are chained
/// causes in vector order. Message text is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// Primary error code.
    pub error_code: i32,
    /// Five character SQLSTATE when the vector carried one.
    pub sql_state: Option<String>,
    /// Full chain, primary entry first.
    pub entries: Vec<StatusEntry>,
}

impl DatabaseError {
    /// Creates an error with a single entry and no parameters.
    #[must_use]
    pub fn new(error_code: i32) -> Self {
        Self {
            error_code,
            sql_state: None,
            entries: vec![StatusEntry::new(error_code, StatusKind::Error)],
        }
    }

    /// Adds a message parameter to the last entry of the chain.
    #[must_use]
    pub fn with_parameter(mut self, parameter: MessageParameter) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.parameters.push(parameter);
        }
        self
    }

    /// Parameters of the primary entry.
    #[must_use]
    pub fn parameters(&self) -> &[MessageParameter] {
        self.entries
            .first()
            .map_or(&[][..], |entry| entry.parameters.as_slice())
    }

    /// Returns `true` if `code` appears anywhere in the chain.
    #[must_use]
    pub fn contains_code(&self, code: i32) -> bool {
        self.entries.iter().any(|entry| entry.code == code)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "firebird error ")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write_entry(f, entry)?;
        }
        if let Some(state) = &self.sql_state {
            write!(f, " (SQLSTATE {state})")?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

/// Warning decoded from a status vector. Never returned as an error; see
/// [`WarningCallback`](crate::status::WarningCallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseWarning {
    /// Warning code.
    pub code: i32,
    /// Parameters that followed the warning tag.
    pub parameters: Vec<MessageParameter>,
}

impl fmt::Display for DatabaseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "firebird warning ")?;
        write_entry(
            f,
            &StatusEntry {
                code: self.code,
                kind: StatusKind::Warning,
                parameters: self.parameters.clone(),
            },
        )
    }
}

/// A single failed attempt to load a candidate library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    /// Library name or path that was tried.
    pub candidate: String,
    /// Loader error text.
    pub reason: String,
}

/// Native library resolution failures.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Every candidate failed; attempts are listed in the order tried.
    #[error("no native client library could be loaded ({})", format_attempts(.attempts))]
    NoCandidateLoaded {
        /// All failures, first candidate first.
        attempts: Vec<LoadAttempt>,
    },

    /// The library loaded but lacks a mandatory entry point.
    #[error("entry point `{symbol}` not found in {library}")]
    MissingEntryPoint {
        /// Library name or path.
        library: String,
        /// Missing symbol.
        symbol: &'static str,
    },

    /// An embedded provider could not produce a usable entry point.
    #[error("embedded provider {provider}: {reason}")]
    Embedded {
        /// Provider name.
        provider: String,
        /// Failure description.
        reason: String,
    },
}

fn format_attempts(attempts: &[LoadAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.candidate, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised by the native client bridge.
#[derive(Debug, Clone, Error)]
pub enum FbError {
    /// The native library reported an error through the status vector.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The driver refused to issue a native call in the current state.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Firebird error code associated with the violation, if any.
        code: Option<i32>,
        /// Description of the violated precondition.
        message: String,
    },

    /// A value exceeded a limit of the loaded library or field.
    #[error("implementation limit exceeded for {what}: maximum {limit}, actual {actual}")]
    LimitExceeded {
        /// What was too large.
        what: &'static str,
        /// The limit.
        limit: usize,
        /// The offending size.
        actual: usize,
    },

    /// The native library or one of its entry points could not be resolved.
    #[error("native library load error: {0}")]
    Load(#[from] LoadError),

    /// The native library was disposed; no further calls are possible.
    #[error("native client library has been disposed")]
    LibraryDisposed,

    /// An optional entry point was called although it is not available.
    #[error("optional entry point `{0}` is not available in the loaded library")]
    FeatureUnavailable(&'static str),

    /// Caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Character set not supported by the bridge.
    #[error("unsupported character set: {0}")]
    UnsupportedEncoding(String),

    /// A lock was poisoned by a panicking thread.
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl FbError {
    /// Builds a database error with a single code.
    #[must_use]
    pub fn database(code: i32) -> Self {
        Self::Database(DatabaseError::new(code))
    }

    /// Builds an illegal state error without a Firebird code.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            code: None,
            message: message.into(),
        }
    }

    /// Builds an illegal state error carrying a Firebird code.
    pub fn illegal_state_code(code: i32, message: impl Into<String>) -> Self {
        Self::IllegalState {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Firebird error code of this error, if it has one.
    #[must_use]
    pub const fn error_code(&self) -> Option<i32> {
        match self {
            Self::Database(e) => Some(e.error_code),
            Self::IllegalState { code, .. } => *code,
            _ => None,
        }
    }

    /// SQLSTATE reported by the server, if any.
    #[must_use]
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database(e) => e.sql_state.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` for errors raised locally because of a state violation.
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }
}
