use host::{color::MarkerColor, record::Frame};

use crate::error::MarkerError;

/// Which markers a delete targets. Each variant maps onto one remote call with
/// its own reach:
///
/// - `Frame` removes exactly that marker.
/// - `Color` removes **every** marker of that color.
/// - `CustomData` removes one marker: the cached match with the lowest frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerSelector {
    Frame(Frame),
    Color(MarkerColor),
    CustomData(String),
}

impl MarkerSelector {
    pub fn custom_data(custom_data: impl Into<String>) -> Self {
        Self::CustomData(custom_data.into())
    }

    /// Builds a selector from optional parts, the first one supplied wins in
    /// the order frame, color, custom data. Empty strings count as not
    /// supplied.
    pub fn from_parts(
        frame: Option<Frame>,
        color: Option<&str>,
        custom_data: Option<&str>,
    ) -> Result<Self, MarkerError> {
        if let Some(frame) = frame {
            return Ok(Self::Frame(frame));
        }

        if let Some(color) = color.filter(|color| !color.is_empty()) {
            return Ok(Self::Color(color.parse()?));
        }

        match custom_data.filter(|custom_data| !custom_data.is_empty()) {
            Some(custom_data) => Ok(Self::custom_data(custom_data)),
            None => Err(MarkerError::NoSelector),
        }
    }
}

impl From<Frame> for MarkerSelector {
    fn from(value: Frame) -> Self {
        Self::Frame(value)
    }
}

impl From<MarkerColor> for MarkerSelector {
    fn from(value: MarkerColor) -> Self {
        Self::Color(value)
    }
}
