//! Catalog dimensions: apps, channels, platforms, architectures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four taxonomy dimensions of the release catalog.
///
/// All four share one record shape; store operations branch on the kind
/// rather than dispatching across per-kind types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    App,
    Channel,
    Platform,
    Arch,
}

impl DimensionKind {
    /// All kinds, in the order they gate uploads.
    pub const ALL: [DimensionKind; 4] = [
        DimensionKind::App,
        DimensionKind::Channel,
        DimensionKind::Platform,
        DimensionKind::Arch,
    ];

    /// Stable lowercase identifier, used as the database discriminator
    /// and as the JSON field name in requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Channel => "channel",
            Self::Platform => "platform",
            Self::Arch => "arch",
        }
    }

    /// Capitalized form used in response keys (`createAppResult.Created`).
    pub fn title(&self) -> &'static str {
        match self {
            Self::App => "App",
            Self::Channel => "Channel",
            Self::Platform => "Platform",
            Self::Arch => "Arch",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "app" => Some(Self::App),
            "channel" => Some(Self::Channel),
            "platform" => Some(Self::Platform),
            "arch" => Some(Self::Arch),
            _ => None,
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate an app name: non-empty, alphanumeric only.
pub fn is_valid_app_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Validate the surface form of a version string before numeric parsing:
/// digits, dots, and dashes only.
pub fn is_valid_version_input(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}
