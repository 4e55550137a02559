/// Marker length in frames when none is given
pub const DEFAULT_DURATION: u64 = 1;

/// Frames shown before and after the ellipsis when a collection is displayed.
pub const DISPLAY_HEAD: usize = 2;
pub const DISPLAY_TAIL: usize = 2;
