//! Link types for provenance edges.
//!
//! A link is a directed, typed, labeled edge between two nodes. The
//! [`LinkType`] encodes the *kind* of provenance relationship; it is passed
//! through to storage unchanged and validated only by node-kind hooks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Semantic classification of a provenance link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// No particular semantics attached.
    #[default]
    Unspecified,
    /// The source created the destination (e.g. a process creating data).
    Create,
    /// The destination is returned by the source.
    Return,
    /// The destination consumes the source as an input.
    Input,
    /// The source called the destination.
    Call,
}

impl LinkType {
    /// Stable string form used by the storage collaborator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Create => "create",
            Self::Return => "return",
            Self::Input => "input",
            Self::Call => "call",
        }
    }

    /// All link types, in declaration order.
    pub fn all() -> [LinkType; 5] {
        [
            Self::Unspecified,
            Self::Create,
            Self::Return,
            Self::Input,
            Self::Call,
        ]
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unspecified" => Ok(Self::Unspecified),
            "create" => Ok(Self::Create),
            "return" => Ok(Self::Return),
            "input" => Ok(Self::Input),
            "call" => Ok(Self::Call),
            other => Err(TypeError::UnknownLinkType(other.to_string())),
        }
    }
}
