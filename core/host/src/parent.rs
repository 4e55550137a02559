use std::fmt;

/// The host entities that carry their own marker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentKind {
    /// A clip in the media pool.
    MediaPoolItem,
    Timeline,
    /// A clip placed on a timeline track.
    TimelineItem,
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::MediaPoolItem => "media pool item",
            Self::Timeline => "timeline",
            Self::TimelineItem => "timeline item",
        };
        f.write_str(label)
    }
}
