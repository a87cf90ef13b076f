//! Optional entry points of the loaded client library.

use std::collections::BTreeSet;
use std::fmt;

use strum::{Display, EnumIter, IntoEnumIterator};

/// An optional native entry point whose presence depends on the version or
/// build of the client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum ClientFeature {
    /// `fb_dsql_set_timeout` (Firebird 4+).
    StatementTimeout,
    /// `fb_ping` (Firebird 2.5+). Also implies the library accepts
    /// nul-terminated statement text longer than 64 KiB.
    FbPing,
    /// `fb_disconnect_transaction` (Firebird 3+).
    FbDisconnectTransaction,
    /// `fb_cancel_operation` (Firebird 2.5+).
    FbCancelOperation,
    /// `fb_shutdown` (Firebird 2.5+).
    FbShutdown,
}

impl ClientFeature {
    /// Name of the entry point that enables this feature.
    #[must_use]
    pub const fn entry_point(self) -> &'static str {
        match self {
            Self::StatementTimeout => "fb_dsql_set_timeout",
            Self::FbPing => "fb_ping",
            Self::FbDisconnectTransaction => "fb_disconnect_transaction",
            Self::FbCancelOperation => "fb_cancel_operation",
            Self::FbShutdown => "fb_shutdown",
        }
    }

    /// All features, in declaration order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}

/// Immutable set of features detected when a library was loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFeatures(BTreeSet<ClientFeature>);

impl ClientFeatures {
    /// The empty set.
    #[must_use]
    pub const fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Every known feature.
    #[must_use]
    pub fn all() -> Self {
        ClientFeature::all().collect()
    }

    /// Builds the set by asking `has_entry_point` about each feature's
    /// entry point.
    pub fn probe(mut has_entry_point: impl FnMut(&str) -> bool) -> Self {
        ClientFeature::all()
            .filter(|feature| has_entry_point(feature.entry_point()))
            .collect()
    }

    /// Returns `true` if `feature` is present.
    #[must_use]
    pub fn contains(&self, feature: ClientFeature) -> bool {
        self.0.contains(&feature)
    }

    /// Iterates over the present features.
    pub fn iter(&self) -> impl Iterator<Item = ClientFeature> + '_ {
        self.0.iter().copied()
    }

    /// Number of present features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no optional feature is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ClientFeature> for ClientFeatures {
    fn from_iter<I: IntoIterator<Item = ClientFeature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ClientFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|feature| feature.to_string()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
