//! Enumerated primitive property kinds
//!
//! Every property definition carries one of these kinds. Declared field
//! types are matched against them (case-insensitively) to decide whether a
//! field is a property or a child of another type.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primitive kind of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Opaque binary stream
    Binary,
    /// Boolean
    Boolean,
    /// Calendar date/time
    Date,
    /// Arbitrary-precision decimal
    Decimal,
    /// 64-bit float
    Double,
    /// 64-bit integer
    Long,
    /// Namespaced name
    Name,
    /// Repository path
    Path,
    /// Hard reference to another node
    Reference,
    /// Unicode string
    String,
    /// URI
    Uri,
    /// Weak reference to another node
    WeakReference,
}

impl PropertyKind {
    /// All kinds, in canonical order
    pub const ALL: [PropertyKind; 12] = [
        PropertyKind::Binary,
        PropertyKind::Boolean,
        PropertyKind::Date,
        PropertyKind::Decimal,
        PropertyKind::Double,
        PropertyKind::Long,
        PropertyKind::Name,
        PropertyKind::Path,
        PropertyKind::Reference,
        PropertyKind::String,
        PropertyKind::Uri,
        PropertyKind::WeakReference,
    ];

    /// Canonical name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Binary => "Binary",
            PropertyKind::Boolean => "Boolean",
            PropertyKind::Date => "Date",
            PropertyKind::Decimal => "Decimal",
            PropertyKind::Double => "Double",
            PropertyKind::Long => "Long",
            PropertyKind::Name => "Name",
            PropertyKind::Path => "Path",
            PropertyKind::Reference => "Reference",
            PropertyKind::String => "String",
            PropertyKind::Uri => "URI",
            PropertyKind::WeakReference => "WeakReference",
        }
    }

    /// Look up a kind from a declared type alias, case-insensitively.
    ///
    /// Returns None when the alias names no primitive kind, which is how
    /// field declarations referring to other content types are recognized.
    pub fn from_alias(alias: &str) -> Option<Self> {
        PropertyKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(alias))
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyKind::from_alias(s).ok_or_else(|| Error::UnknownPropertyKind(s.to_string()))
    }
}
