use std::cell::{Cell, RefCell};

use log::debug;

use crate::{
    color::MarkerColor,
    record::{Frame, RemoteMarker, RemoteMarkers},
    store::MarkerStore,
};

/// A mutating call received by a [`MemoryMarkerStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Add(Frame),
    DeleteAtFrame(Frame),
    DeleteByColor(String),
    DeleteByCustomData(String),
    UpdateCustomData(Frame),
}

/// In-process marker store following the host's rules.
///
/// - `add_marker` is rejected for an occupied frame, a zero duration, a color
///   outside the palette, or a marker running past the parent's length.
/// - `delete_marker_by_custom_data` removes the match with the lowest frame.
///
/// Every mutating call is journaled so callers can check how many round trips
/// an operation cost. Deletes can be switched to fail with
/// [`Self::set_reject_deletes`], the way a host refuses edits to a locked
/// track.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: RefCell<RemoteMarkers>,
    /// Parent length in frames, `None` for unbounded
    length: Option<u64>,
    calls: RefCell<Vec<StoreCall>>,
    reads: Cell<usize>,
    reject_deletes: Cell<bool>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for a parent that is `length` frames long.
    pub fn with_length(length: u64) -> Self {
        Self {
            length: Some(length),
            ..Self::default()
        }
    }

    /// Changes remote state without journaling, the way a user editing markers
    /// in the host UI would.
    pub fn insert_out_of_band(&self, frame: Frame, marker: RemoteMarker) {
        self.markers.borrow_mut().insert(frame, marker);
    }

    pub fn remove_out_of_band(&self, frame: Frame) -> Option<RemoteMarker> {
        self.markers.borrow_mut().remove(&frame)
    }

    /// Mutating calls received so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    /// While set, every delete answers `false` and leaves the markers alone.
    pub fn set_reject_deletes(&self, reject: bool) {
        self.reject_deletes.set(reject);
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of full reads served.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    pub fn len(&self) -> usize {
        self.markers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.borrow().is_empty()
    }

    pub fn get(&self, frame: Frame) -> Option<RemoteMarker> {
        self.markers.borrow().get(&frame).cloned()
    }

    fn record(&self, call: StoreCall) {
        debug!("memory store call: {call:?}");
        self.calls.borrow_mut().push(call);
    }

    fn fits(&self, frame: Frame, duration: u64) -> bool {
        if duration == 0 {
            return false;
        }

        match self.length {
            Some(length) => frame
                .checked_add(duration)
                .is_some_and(|end| end <= length),
            None => true,
        }
    }

    fn first_tagged(&self, custom_data: &str) -> Option<Frame> {
        self.markers
            .borrow()
            .iter()
            .find(|(_, marker)| marker.custom_data == custom_data)
            .map(|(frame, _)| *frame)
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn markers(&self) -> RemoteMarkers {
        self.reads.set(self.reads.get() + 1);
        self.markers.borrow().clone()
    }

    fn add_marker(&self, frame: Frame, marker: &RemoteMarker) -> bool {
        self.record(StoreCall::Add(frame));

        if marker.color.parse::<MarkerColor>().is_err() || !self.fits(frame, marker.duration) {
            return false;
        }

        let mut markers = self.markers.borrow_mut();
        if markers.contains_key(&frame) {
            return false;
        }
        markers.insert(frame, marker.clone());
        true
    }

    fn delete_marker_at_frame(&self, frame: Frame) -> bool {
        self.record(StoreCall::DeleteAtFrame(frame));
        if self.reject_deletes.get() {
            return false;
        }
        self.markers.borrow_mut().remove(&frame).is_some()
    }

    fn delete_markers_by_color(&self, color: &str) -> bool {
        self.record(StoreCall::DeleteByColor(color.to_owned()));

        if self.reject_deletes.get() || color.parse::<MarkerColor>().is_err() {
            return false;
        }
        self.markers
            .borrow_mut()
            .retain(|_, marker| marker.color != color);
        true
    }

    fn delete_marker_by_custom_data(&self, custom_data: &str) -> bool {
        self.record(StoreCall::DeleteByCustomData(custom_data.to_owned()));
        if self.reject_deletes.get() {
            return false;
        }

        match self.first_tagged(custom_data) {
            Some(frame) => self.markers.borrow_mut().remove(&frame).is_some(),
            None => false,
        }
    }

    fn update_marker_custom_data(&self, frame: Frame, custom_data: &str) -> bool {
        self.record(StoreCall::UpdateCustomData(frame));

        match self.markers.borrow_mut().get_mut(&frame) {
            Some(marker) => {
                custom_data.clone_into(&mut marker.custom_data);
                true
            }
            None => false,
        }
    }

    fn marker_by_custom_data(&self, custom_data: &str) -> RemoteMarkers {
        self.first_tagged(custom_data)
            .and_then(|frame| self.get(frame).map(|marker| (frame, marker)))
            .into_iter()
            .collect()
    }

    fn marker_custom_data(&self, frame: Frame) -> String {
        self.get(frame)
            .map(|marker| marker.custom_data)
            .unwrap_or_default()
    }
}
