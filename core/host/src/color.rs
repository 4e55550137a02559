use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed marker palette offered by the host. Names are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum MarkerColor {
    Blue,
    Cyan,
    Green,
    Yellow,
    Red,
    Pink,
    Purple,
    Fuchsia,
    Rose,
    Lavender,
    Sky,
    Mint,
    Lemon,
    Sand,
    Cocoa,
    Cream,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a marker color")]
pub struct ParseColorError(pub String);

impl MarkerColor {
    pub const ALL: [Self; 16] = [
        Self::Blue,
        Self::Cyan,
        Self::Green,
        Self::Yellow,
        Self::Red,
        Self::Pink,
        Self::Purple,
        Self::Fuchsia,
        Self::Rose,
        Self::Lavender,
        Self::Sky,
        Self::Mint,
        Self::Lemon,
        Self::Sand,
        Self::Cocoa,
        Self::Cream,
    ];

    /// Name used by the host's scripting surface
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Cyan => "Cyan",
            Self::Green => "Green",
            Self::Yellow => "Yellow",
            Self::Red => "Red",
            Self::Pink => "Pink",
            Self::Purple => "Purple",
            Self::Fuchsia => "Fuchsia",
            Self::Rose => "Rose",
            Self::Lavender => "Lavender",
            Self::Sky => "Sky",
            Self::Mint => "Mint",
            Self::Lemon => "Lemon",
            Self::Sand => "Sand",
            Self::Cocoa => "Cocoa",
            Self::Cream => "Cream",
        }
    }
}

impl FromStr for MarkerColor {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| ParseColorError(s.to_owned()))
    }
}

impl TryFrom<String> for MarkerColor {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MarkerColor> for &'static str {
    fn from(value: MarkerColor) -> Self {
        value.as_str()
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
