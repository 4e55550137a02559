use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Frame position of a marker inside its parent.
pub type Frame = u64;

/// One marker exactly as the host reports it: every field is a plain string or
/// integer, the color included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMarker {
    pub color: String,
    /// Length in frames
    pub duration: u64,
    pub name: String,
    pub note: String,
    /// Free-text tag, not shown in the host UI
    #[serde(rename = "customData")]
    pub custom_data: String,
}

/// Markers keyed by frame, as returned by the host's read operations.
pub type RemoteMarkers = BTreeMap<Frame, RemoteMarker>;
