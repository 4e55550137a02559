use std::fmt;

use host::{
    color::{MarkerColor, ParseColorError},
    record::{Frame, RemoteMarker},
    store::MarkerStore,
};
use log::{error, warn};
use serde::Serialize;

use crate::{
    collection::MarkerCollection, constants::DEFAULT_DURATION, error::MarkerError,
    selector::MarkerSelector,
};

/// Snapshot of one cached marker.
///
/// A `Marker` is a value: it does not follow later changes made through the
/// collection. Holding one across a mutation leaves it describing the marker
/// as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    frame: Frame,
    color: MarkerColor,
    name: String,
    note: String,
    /// Length in frames, at least 1
    duration: u64,
    custom_data: String,
}

impl Marker {
    pub(crate) fn from_remote(frame: Frame, remote: &RemoteMarker) -> Result<Self, ParseColorError> {
        Ok(Self {
            frame,
            color: remote.color.parse()?,
            name: remote.name.clone(),
            note: remote.note.clone(),
            duration: remote.duration,
            custom_data: remote.custom_data.clone(),
        })
    }

    pub(crate) fn to_remote(&self) -> RemoteMarker {
        RemoteMarker {
            color: self.color.as_str().to_owned(),
            duration: self.duration,
            name: self.name.clone(),
            note: self.note.clone(),
            custom_data: self.custom_data.clone(),
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn color(&self) -> MarkerColor {
        self.color
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn custom_data(&self) -> &str {
        &self.custom_data
    }

    /// True when the note, name, custom data or color name equals `needle`.
    pub fn matches(&self, needle: &str) -> bool {
        self.note == needle
            || self.name == needle
            || self.custom_data == needle
            || self.color.as_str() == needle
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker(Frame: {}, custom: {})", self.frame, self.custom_data)
    }
}

/// A marker to be added, with the optional fields defaulted.
///
/// ```
/// use markers::{MarkerColor, marker::NewMarker};
///
/// let marker = NewMarker::new(120, MarkerColor::Green, "Slate")
///     .note("check focus")
///     .duration(24)
///     .custom_data("qc")
///     .overwrite(true);
/// assert_eq!(marker.frame(), 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMarker {
    marker: Marker,
    overwrite: bool,
}

impl NewMarker {
    pub fn new(frame: Frame, color: MarkerColor, name: impl Into<String>) -> Self {
        Self {
            marker: Marker {
                frame,
                color,
                name: name.into(),
                note: String::new(),
                duration: DEFAULT_DURATION,
                custom_data: String::new(),
            },
            overwrite: false,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.marker.note = note.into();
        self
    }

    /// Must be at least 1; a zero duration is refused when the marker is added.
    #[must_use]
    pub fn duration(mut self, duration: u64) -> Self {
        self.marker.duration = duration;
        self
    }

    /// Tag for programmatic lookups, not shown in the host UI.
    #[must_use]
    pub fn custom_data(mut self, custom_data: impl Into<String>) -> Self {
        self.marker.custom_data = custom_data.into();
        self
    }

    /// Replace a marker already cached at the same frame instead of skipping.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn frame(&self) -> Frame {
        self.marker.frame
    }

    pub(crate) fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub(crate) fn as_marker(&self) -> &Marker {
        &self.marker
    }

    pub(crate) fn into_marker(self) -> Marker {
        self.marker
    }
}

impl From<Marker> for NewMarker {
    fn from(value: Marker) -> Self {
        Self {
            marker: value,
            overwrite: false,
        }
    }
}

/// Mutable handle to one cached marker.
///
/// The host can only update a marker's custom data in place. Every other field
/// change is carried out as a delete followed by an add at the collection
/// level. The handle borrows the collection exclusively, so the gap between
/// the two steps is never observable from outside.
#[derive(Debug)]
pub struct MarkerMut<'a, S> {
    collection: &'a mut MarkerCollection<S>,
    marker: Marker,
}

impl<'a, S: MarkerStore> MarkerMut<'a, S> {
    pub(crate) fn new(collection: &'a mut MarkerCollection<S>, marker: Marker) -> Self {
        Self { collection, marker }
    }

    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn frame(&self) -> Frame {
        self.marker.frame
    }

    pub fn color(&self) -> MarkerColor {
        self.marker.color
    }

    pub fn name(&self) -> &str {
        &self.marker.name
    }

    pub fn note(&self) -> &str {
        &self.marker.note
    }

    pub fn duration(&self) -> u64 {
        self.marker.duration
    }

    pub fn custom_data(&self) -> &str {
        &self.marker.custom_data
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), MarkerError> {
        let mut next = self.marker.clone();
        next.name = name.into();
        self.recreate(next)
    }

    pub fn set_note(&mut self, note: impl Into<String>) -> Result<(), MarkerError> {
        let mut next = self.marker.clone();
        next.note = note.into();
        self.recreate(next)
    }

    /// Zero is rejected before anything is deleted.
    pub fn set_duration(&mut self, duration: u64) -> Result<(), MarkerError> {
        if duration == 0 {
            return Err(MarkerError::InvalidDuration);
        }

        let mut next = self.marker.clone();
        next.duration = duration;
        self.recreate(next)
    }

    pub fn set_color(&mut self, color: MarkerColor) -> Result<(), MarkerError> {
        let mut next = self.marker.clone();
        next.color = color;
        self.recreate(next)
    }

    /// Like [`Self::set_color`] for a host color name. An unknown name is
    /// rejected before anything is deleted.
    pub fn set_color_str(&mut self, color: &str) -> Result<(), MarkerError> {
        self.set_color(color.parse()?)
    }

    /// Moves the marker. Fails without touching the host if `frame` is
    /// already taken by another cached marker.
    pub fn set_frame(&mut self, frame: Frame) -> Result<(), MarkerError> {
        if frame != self.marker.frame && self.collection.contains(frame) {
            return Err(MarkerError::Occupied(frame));
        }

        let mut next = self.marker.clone();
        next.frame = frame;
        self.recreate(next)
    }

    /// The one in-place update the host supports.
    pub fn set_custom_data(&mut self, custom_data: impl Into<String>) -> Result<(), MarkerError> {
        let custom_data = custom_data.into();
        let frame = self.marker.frame;

        if !self
            .collection
            .store()
            .update_marker_custom_data(frame, &custom_data)
        {
            error!("Couldn't update custom data of marker at frame {frame}");
            return Err(MarkerError::Rejected { frame });
        }

        self.marker.custom_data = custom_data;
        self.collection.register(self.marker.clone());
        Ok(())
    }

    pub fn delete(self) -> Result<bool, MarkerError> {
        self.collection.delete(MarkerSelector::Frame(self.marker.frame))
    }

    fn recreate(&mut self, next: Marker) -> Result<(), MarkerError> {
        let frame = next.frame;
        if !self.collection.remove_at(self.marker.frame) {
            error!("Host kept marker at frame {}, update dropped", self.marker.frame);
            return Err(MarkerError::Rejected {
                frame: self.marker.frame,
            });
        }

        if let Some(created) = self.collection.add_with(NewMarker::from(next)) {
            self.marker = created;
            return Ok(());
        }

        warn!("Restoring marker at frame {} after rejected update", self.marker.frame);
        if self
            .collection
            .add_with(NewMarker::from(self.marker.clone()))
            .is_none()
        {
            error!("Marker at frame {} could not be restored", self.marker.frame);
        }
        Err(MarkerError::Rejected { frame })
    }
}
