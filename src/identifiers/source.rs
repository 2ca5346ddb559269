use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Receiver identity: 4-character marker plus a free-form type tag
/// (spec.md §3 `SourceID`). Grounded on `original_source/src/ProceFrame/SourceID.{hpp,cpp}`,
/// which pairs a station/source name with a source type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceId {
    /// 4-character station marker, e.g. `"ALGO"`.
    pub marker: String,
    /// Receiver/antenna type tag, e.g. `"GEODETIC"` or `"UNKNOWN"`.
    pub receiver_type: String,
}

impl SourceId {
    pub fn new(marker: impl Into<String>, receiver_type: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            receiver_type: receiver_type.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.marker, self.receiver_type)
    }
}
