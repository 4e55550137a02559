use host::{color::ParseColorError, record::Frame};
use thiserror::Error;

/// Local precondition failures. Rejections coming back from the host are not
/// errors on `add`/`delete`; those report through `None`/`false` and the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("provide a frame, a color or custom data to select markers")]
    NoSelector,
    #[error("no cached marker at frame {0}")]
    NotFound(Frame),
    #[error(transparent)]
    InvalidColor(#[from] ParseColorError),
    #[error("marker duration must be at least one frame")]
    InvalidDuration,
    #[error("a marker already exists at frame {0}")]
    Occupied(Frame),
    #[error("host rejected the marker at frame {frame}")]
    Rejected { frame: Frame },
}
