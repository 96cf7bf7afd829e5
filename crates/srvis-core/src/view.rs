//! Which localisation table a request resolves to.
//!
//! The store keeps up to four unfiltered tables (raw, grouped,
//! drift-corrected, drift-corrected ungrouped), each with a filtered sibling.
//! [`resolve_view`] is the single place that decides which of them a caller
//! gets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the unfiltered tables held by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    /// Localisations as read from file.
    Original,
    /// Repeated detections of one emitter merged into one entry.
    Grouped,
    /// Grouped and corrected for stage drift.
    DriftCorrected,
    /// Corrected for stage drift without grouping.
    DriftCorrectedUngrouped,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Original,
        Variant::Grouped,
        Variant::DriftCorrected,
        Variant::DriftCorrectedUngrouped,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Grouped => "grouped",
            Variant::DriftCorrected => "driftCorrected",
            Variant::DriftCorrectedUngrouped => "driftCorrectedUngrouped",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown data variant '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// State flags that gate which variant is authoritative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFlags {
    pub is_filtered: bool,
    pub is_grouped: bool,
    /// Drift was estimated and fiducials were found.
    pub has_drift_correction: bool,
}

/// Outcome of [`resolve_view`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedView {
    pub variant: Variant,
    pub filtered: bool,
}

impl fmt::Display for ResolvedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filtered {
            write!(f, "{}Filtered", self.variant)
        } else {
            write!(f, "{}", self.variant)
        }
    }
}

/// Pick the table a request refers to.
///
/// With no explicit `request`, drift-corrected beats grouped beats original.
/// An explicit request skips that preference. In both cases the filtered
/// sibling is chosen iff the store is filtered and `include_filtered` is set.
pub fn resolve_view(
    flags: ViewFlags,
    request: Option<Variant>,
    include_filtered: bool,
) -> ResolvedView {
    let variant = request.unwrap_or(if flags.has_drift_correction {
        Variant::DriftCorrected
    } else if flags.is_grouped {
        Variant::Grouped
    } else {
        Variant::Original
    });
    ResolvedView {
        variant,
        filtered: flags.is_filtered && include_filtered,
    }
}
