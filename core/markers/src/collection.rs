use std::fmt;

use host::{
    color::MarkerColor,
    parent::ParentKind,
    record::{Frame, RemoteMarkers},
    store::MarkerStore,
};
use indexmap::IndexMap;
use log::{debug, error, info, warn};

use crate::{
    constants::{DISPLAY_HEAD, DISPLAY_TAIL},
    error::MarkerError,
    marker::{Marker, MarkerMut, NewMarker},
    selector::MarkerSelector,
};

/// Local cache of one parent entity's markers, kept in step with the host.
///
/// The cache is a projection of remote state with no expiry. It is only known
/// to be current right after [`Self::fetch`]; [`Self::all`] and [`Self::iter`]
/// fetch first, every other read answers from the cache and may be stale if
/// markers were edited in the host meanwhile.
///
/// Writes go to the host first and the cache is updated to match, so after
/// any call returns the two agree on the frames that call touched.
#[derive(Debug)]
pub struct MarkerCollection<S> {
    parent: ParentKind,
    store: S,
    /// Keyed by frame, in insertion order
    cache: IndexMap<Frame, Marker>,
}

impl<S: MarkerStore> MarkerCollection<S> {
    /// Creates the collection and loads the current marker set.
    pub fn new(parent: ParentKind, store: S) -> Self {
        let mut collection = Self {
            parent,
            store,
            cache: IndexMap::new(),
        };
        collection.fetch();
        collection
    }

    pub fn parent(&self) -> ParentKind {
        self.parent
    }

    /// The remote handle this collection talks to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-reads every marker from the host. Entries still present keep their
    /// place in the cache, new ones are appended and entries gone from the host
    /// are dropped.
    pub fn fetch(&mut self) {
        let remote = self.store.markers();
        let before = self.cache.len();

        self.cache.retain(|frame, _| remote.contains_key(frame));
        for (frame, data) in &remote {
            match Marker::from_remote(*frame, data) {
                Ok(marker) => {
                    self.cache.insert(*frame, marker);
                }
                Err(e) => {
                    warn!("Skipping {} marker at frame {frame}: {e}", self.parent);
                    self.cache.shift_remove(frame);
                }
            }
        }

        debug!(
            "Fetched {} {} markers ({before} cached before)",
            self.cache.len(),
            self.parent
        );
    }

    /// Same as [`Self::fetch`].
    pub fn refresh(&mut self) {
        self.fetch();
    }

    /// Drops the cache without asking the host. Cache-only reads see nothing
    /// until the next fetch.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Adds a marker with default note, duration and custom data.
    pub fn add(&mut self, frame: Frame, color: MarkerColor, name: impl Into<String>) -> Option<Marker> {
        self.add_with(NewMarker::new(frame, color, name))
    }

    /// Adds a marker on the host and caches it.
    ///
    /// Returns `None` without calling the host when the frame is already
    /// cached and `overwrite` is off, or when the duration is zero. With
    /// `overwrite` the cached marker is deleted first; if the host keeps it,
    /// nothing is added. Returns `None` as well when the host rejects the
    /// marker, usually because the frame or duration does not fit the parent.
    pub fn add_with(&mut self, new: NewMarker) -> Option<Marker> {
        let frame = new.frame();

        if new.as_marker().duration() == 0 {
            error!("Couldn't add marker at frame {frame}: {}", MarkerError::InvalidDuration);
            return None;
        }

        if self.cache.contains_key(&frame) {
            if !new.is_overwrite() {
                info!(
                    "Marker at frame {frame} already exists. Skipping, set overwrite to replace it"
                );
                return None;
            }
            warn!("Marker at frame {frame} already exists. Overwriting");
            if !self.remove_at(frame) {
                error!("Couldn't overwrite marker at frame {frame}, the host kept it");
                return None;
            }
        }

        if !self.store.add_marker(frame, &new.as_marker().to_remote()) {
            error!(
                "Couldn't add marker at frame {frame} to {}. Make sure the frame is inside it and the duration isn't longer than it",
                self.parent
            );
            return None;
        }

        let marker = new.into_marker();
        self.cache.insert(frame, marker.clone());
        Some(marker)
    }

    /// First cached marker whose note, name, custom data or color equals
    /// `needle`, in cache order.
    pub fn find(&self, needle: &str) -> Option<&Marker> {
        self.cache.values().find(|marker| marker.matches(needle))
    }

    /// Every cached match for `needle`, `None` when there are none.
    pub fn find_all(&self, needle: &str) -> Option<Vec<&Marker>> {
        let found: Vec<_> = self
            .cache
            .values()
            .filter(|marker| marker.matches(needle))
            .collect();
        (!found.is_empty()).then_some(found)
    }

    /// Asks the host directly, ignoring the cache.
    pub fn get_custom(&self, custom_data: &str) -> RemoteMarkers {
        self.store.marker_by_custom_data(custom_data)
    }

    /// Custom data stored on the host for the marker at `frame`.
    pub fn custom_data_at(&self, frame: Frame) -> String {
        self.store.marker_custom_data(frame)
    }

    /// Deletes markers on the host and from the cache.
    ///
    /// Deleting by frame fails with [`MarkerError::NotFound`] when nothing is
    /// cached there. Deleting by custom data removes the cached match with the
    /// lowest frame: the host removes "the first" match without saying which,
    /// and lowest frame is the order it has been observed to use.
    ///
    /// The returned `bool` is the host's answer. The cache only changes when
    /// the host confirms the delete.
    pub fn delete(&mut self, selector: impl Into<MarkerSelector>) -> Result<bool, MarkerError> {
        match selector.into() {
            MarkerSelector::Frame(frame) => {
                if !self.cache.contains_key(&frame) {
                    return Err(MarkerError::NotFound(frame));
                }
                Ok(self.remove_at(frame))
            }
            MarkerSelector::Color(color) => {
                debug!("Deleting every {color} marker from {}", self.parent);
                let deleted = self.store.delete_markers_by_color(color.as_str());
                if deleted {
                    self.cache.retain(|_, marker| marker.color() != color);
                }
                Ok(deleted)
            }
            MarkerSelector::CustomData(custom_data) => {
                let target = self
                    .cache
                    .values()
                    .filter(|marker| marker.custom_data() == custom_data)
                    .map(Marker::frame)
                    .min();

                let deleted = self.store.delete_marker_by_custom_data(&custom_data);
                if let Some(frame) = target.filter(|_| deleted) {
                    self.cache.shift_remove(&frame);
                }
                Ok(deleted)
            }
        }
    }

    /// Deletes every marker one by one, one host call each. Returns how many
    /// the host confirmed.
    pub fn delete_all(&mut self) -> usize {
        let mut deleted = 0;
        for marker in self.all() {
            match self.delete(marker.frame()) {
                Ok(true) => deleted += 1,
                Ok(false) => warn!("Host kept marker at frame {}", marker.frame()),
                Err(e) => warn!("Cache lost marker at frame {}: {e}", marker.frame()),
            }
        }
        deleted
    }

    /// Fetches, then returns every marker.
    pub fn all(&mut self) -> Vec<Marker> {
        self.fetch();
        self.cache.values().cloned().collect()
    }

    /// Fetches, then iterates over a snapshot. Changing the collection while
    /// iterating does not affect the snapshot.
    pub fn iter(&mut self) -> std::vec::IntoIter<Marker> {
        self.all().into_iter()
    }

    /// Cached marker at `frame`.
    pub fn get(&self, frame: Frame) -> Option<&Marker> {
        self.cache.get(&frame)
    }

    pub fn get_mut(&mut self, frame: Frame) -> Option<MarkerMut<'_, S>> {
        let marker = self.cache.get(&frame)?.clone();
        Some(MarkerMut::new(self, marker))
    }

    pub fn contains(&self, frame: Frame) -> bool {
        self.cache.contains_key(&frame)
    }

    /// Cached markers, without fetching.
    pub fn cached(&self) -> impl Iterator<Item = &Marker> {
        self.cache.values()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Single-frame delete without the cache presence check. The cache entry
    /// is only dropped once the host confirms.
    pub(crate) fn remove_at(&mut self, frame: Frame) -> bool {
        let deleted = self.store.delete_marker_at_frame(frame);
        if deleted {
            self.cache.shift_remove(&frame);
        }
        deleted
    }

    /// Replaces the cached entry for `marker.frame()` in place.
    pub(crate) fn register(&mut self, marker: Marker) {
        self.cache.insert(marker.frame(), marker);
    }
}

impl<S: MarkerStore> IntoIterator for &mut MarkerCollection<S> {
    type Item = Marker;
    type IntoIter = std::vec::IntoIter<Marker>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Shows cached frames only, this never reaches the host.
impl<S> fmt::Display for MarkerCollection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames: Vec<String> = self.cache.keys().map(ToString::to_string).collect();

        if frames.len() <= DISPLAY_HEAD + DISPLAY_TAIL {
            return write!(f, "Markers(frames: {})", frames.join(", "));
        }

        let head = frames[..DISPLAY_HEAD].join(", ");
        let tail = frames[frames.len() - DISPLAY_TAIL..].join(", ");
        write!(f, "Markers(frames: {head}, ..., {tail})")
    }
}

#[cfg(test)]
mod collection_tests {
    use host::{
        memory::{MemoryMarkerStore, StoreCall},
        record::RemoteMarker,
    };

    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn collection(store: &MemoryMarkerStore) -> MarkerCollection<&MemoryMarkerStore> {
        init_logger();
        MarkerCollection::new(ParentKind::Timeline, store)
    }

    fn remote(color: &str, name: &str, custom_data: &str) -> RemoteMarker {
        RemoteMarker {
            color: color.to_owned(),
            duration: 1,
            name: name.to_owned(),
            note: String::new(),
            custom_data: custom_data.to_owned(),
        }
    }

    fn cached_frames<S: MarkerStore>(markers: &MarkerCollection<S>) -> Vec<Frame> {
        markers.cached().map(Marker::frame).collect()
    }

    #[test]
    fn test_new_loads_remote_markers() {
        let store = MemoryMarkerStore::new();
        store.insert_out_of_band(4, remote("Blue", "a", ""));
        store.insert_out_of_band(9, remote("Red", "b", ""));

        let markers = collection(&store);
        assert_eq!(store.read_count(), 1);
        assert_eq!(cached_frames(&markers), vec![4, 9]);
        assert_eq!(markers.get(9).unwrap().color(), MarkerColor::Red);
    }

    #[test]
    fn test_add_skips_occupied_frame_then_overwrites() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);

        let added = markers
            .add_with(NewMarker::new(10, MarkerColor::Blue, "A").custom_data("x"))
            .unwrap();
        assert_eq!(added.frame(), 10);

        assert!(markers.add(10, MarkerColor::Red, "B").is_none());
        assert_eq!(markers.get(10).unwrap().color(), MarkerColor::Blue);
        assert_eq!(store.calls(), vec![StoreCall::Add(10)]);

        let replaced = markers
            .add_with(NewMarker::new(10, MarkerColor::Red, "B").overwrite(true))
            .unwrap();
        assert_eq!(replaced.name(), "B");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers.get(10).unwrap().color(), MarkerColor::Red);
        assert_eq!(markers.get(10).unwrap().name(), "B");
        assert_eq!(store.get(10).unwrap().color, "Red");
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::Add(10),
                StoreCall::DeleteAtFrame(10),
                StoreCall::Add(10)
            ]
        );
    }

    #[test]
    fn test_overwrite_kept_by_host_leaves_marker_cached() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(10, MarkerColor::Blue, "A");
        store.clear_calls();
        store.set_reject_deletes(true);

        let replaced = markers.add_with(NewMarker::new(10, MarkerColor::Red, "B").overwrite(true));
        assert!(replaced.is_none());
        assert_eq!(store.calls(), vec![StoreCall::DeleteAtFrame(10)]);
        assert_eq!(markers.get(10).unwrap().color(), MarkerColor::Blue);
        assert_eq!(store.get(10).unwrap().color, "Blue");
    }

    #[test]
    fn test_zero_duration_add_never_reaches_host() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);

        let added = markers.add_with(NewMarker::new(5, MarkerColor::Blue, "empty").duration(0));
        assert!(added.is_none());
        assert!(store.calls().is_empty());
        assert!(markers.is_empty());
    }

    #[test]
    fn test_add_defaults() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);

        let marker = markers.add(3, MarkerColor::Sand, "plain").unwrap();
        assert_eq!(marker.duration(), 1);
        assert_eq!(marker.note(), "");
        assert_eq!(marker.custom_data(), "");
    }

    #[test]
    fn test_rejected_add_leaves_cache_untouched() {
        let store = MemoryMarkerStore::with_length(50);
        let mut markers = collection(&store);

        let rejected = markers.add_with(NewMarker::new(40, MarkerColor::Blue, "late").duration(20));
        assert!(rejected.is_none());
        assert!(markers.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_cache_never_holds_duplicate_frames() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);

        for (frame, overwrite) in [(1, false), (2, false), (1, false), (1, true), (2, true)] {
            markers.add_with(NewMarker::new(frame, MarkerColor::Cyan, "m").overwrite(overwrite));
        }

        assert_eq!(markers.len(), 2);
        assert_eq!(markers.all().len(), 2);
    }

    #[test]
    fn test_delete_by_frame_removes_only_that_marker() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(1, MarkerColor::Blue, "a");
        markers.add(2, MarkerColor::Blue, "b");

        assert_eq!(markers.delete(MarkerSelector::Frame(1)), Ok(true));
        assert_eq!(cached_frames(&markers), vec![2]);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
    }

    #[test]
    fn test_deletes_kept_by_host_leave_cache_alone() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add_with(NewMarker::new(1, MarkerColor::Blue, "a").custom_data("tag"));
        markers.add(2, MarkerColor::Red, "b");
        store.set_reject_deletes(true);

        assert_eq!(markers.delete(MarkerSelector::Frame(2)), Ok(false));
        assert_eq!(markers.delete(MarkerColor::Blue), Ok(false));
        assert_eq!(markers.delete(MarkerSelector::custom_data("tag")), Ok(false));

        assert_eq!(cached_frames(&markers), vec![1, 2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_delete_missing_frame_fails_before_remote_call() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);

        assert_eq!(
            markers.delete(MarkerSelector::Frame(77)),
            Err(MarkerError::NotFound(77))
        );
        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_delete_from_parts_without_selector_is_rejected() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(1, MarkerColor::Blue, "a");
        store.clear_calls();

        let result =
            MarkerSelector::from_parts(None, None, None).and_then(|selector| markers.delete(selector));
        assert_eq!(result, Err(MarkerError::NoSelector));
        assert!(store.calls().is_empty());
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn test_delete_by_color_removes_every_match() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(1, MarkerColor::Blue, "a");
        markers.add(2, MarkerColor::Red, "b");
        markers.add(3, MarkerColor::Blue, "c");
        markers.add(4, MarkerColor::Green, "d");
        store.clear_calls();

        assert_eq!(markers.delete(MarkerColor::Blue), Ok(true));
        assert_eq!(cached_frames(&markers), vec![2, 4]);
        assert_eq!(
            store.markers().keys().copied().collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(
            store.calls(),
            vec![StoreCall::DeleteByColor("Blue".to_owned())]
        );
    }

    #[test]
    fn test_delete_by_custom_data_takes_lowest_frame_each_time() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        for frame in [5, 20, 12] {
            markers.add_with(NewMarker::new(frame, MarkerColor::Blue, "m").custom_data("tag"));
        }

        assert_eq!(markers.delete(MarkerSelector::custom_data("tag")), Ok(true));
        assert_eq!(cached_frames(&markers), vec![20, 12]);

        assert_eq!(markers.delete(MarkerSelector::custom_data("tag")), Ok(true));
        assert_eq!(cached_frames(&markers), vec![20]);

        assert_eq!(store.markers().keys().copied().collect::<Vec<_>>(), vec![20]);
    }

    #[test]
    fn test_delete_by_custom_data_ignores_other_tags() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add_with(NewMarker::new(1, MarkerColor::Blue, "m").custom_data("other"));
        markers.add_with(NewMarker::new(8, MarkerColor::Blue, "m").custom_data("tag"));

        assert_eq!(markers.delete(MarkerSelector::custom_data("tag")), Ok(true));
        assert_eq!(cached_frames(&markers), vec![1]);
        assert!(store.get(1).is_some());

        assert_eq!(markers.delete(MarkerSelector::custom_data("tag")), Ok(false));
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn test_find_matches_any_text_field_or_color() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add_with(NewMarker::new(30, MarkerColor::Mint, "intro").note("check audio"));
        markers.add_with(NewMarker::new(10, MarkerColor::Red, "outro").custom_data("qc"));
        markers.add_with(NewMarker::new(20, MarkerColor::Red, "credits"));

        assert_eq!(markers.find("intro").unwrap().frame(), 30);
        assert_eq!(markers.find("check audio").unwrap().frame(), 30);
        assert_eq!(markers.find("qc").unwrap().frame(), 10);
        assert_eq!(markers.find("Red").unwrap().frame(), 10);
        assert!(markers.find("missing").is_none());

        let reds: Vec<Frame> = markers
            .find_all("Red")
            .unwrap()
            .into_iter()
            .map(Marker::frame)
            .collect();
        assert_eq!(reds, vec![10, 20]);
        assert!(markers.find_all("missing").is_none());
    }

    #[test]
    fn test_get_custom_reads_host_not_cache() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        store.insert_out_of_band(15, remote("Yellow", "manual", "ext"));

        assert!(markers.find("ext").is_none());
        let found = markers.get_custom("ext");
        assert_eq!(found[&15].name, "manual");
        assert_eq!(markers.custom_data_at(15), "ext");

        markers.fetch();
        assert_eq!(markers.find("ext").unwrap().frame(), 15);
    }

    #[test]
    fn test_all_resyncs_with_out_of_band_changes() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(1, MarkerColor::Blue, "a");
        markers.add(2, MarkerColor::Blue, "b");

        store.remove_out_of_band(1);
        store.insert_out_of_band(3, remote("Pink", "c", ""));

        assert!(markers.contains(1));
        assert!(!markers.contains(3));

        let frames: Vec<Frame> = markers.all().iter().map(Marker::frame).collect();
        assert_eq!(frames, vec![2, 3]);
        assert!(!markers.contains(1));
    }

    #[test]
    fn test_fetch_keeps_cache_order_of_surviving_entries() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(30, MarkerColor::Blue, "a");
        markers.add(10, MarkerColor::Blue, "b");

        markers.fetch();
        assert_eq!(cached_frames(&markers), vec![30, 10]);
    }

    #[test]
    fn test_fetch_skips_unknown_remote_color() {
        let store = MemoryMarkerStore::new();
        store.insert_out_of_band(1, remote("Blue", "ok", ""));
        store.insert_out_of_band(2, remote("Ultraviolet", "bad", ""));

        let markers = collection(&store);
        assert_eq!(cached_frames(&markers), vec![1]);
    }

    #[test]
    fn test_iteration_uses_snapshot() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        for frame in [1, 2, 3] {
            markers.add(frame, MarkerColor::Lemon, "m");
        }
        let reads = store.read_count();

        let mut visited = 0;
        for marker in markers.iter() {
            markers.delete(MarkerSelector::Frame(marker.frame())).unwrap();
            visited += 1;
        }

        assert_eq!(visited, 3);
        assert_eq!(store.read_count(), reads + 1);
        assert!(markers.is_empty());
    }

    #[test]
    fn test_into_iterator_fetches() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        store.insert_out_of_band(6, remote("Sky", "late", ""));

        let names: Vec<String> = (&mut markers)
            .into_iter()
            .map(|marker| marker.name().to_owned())
            .collect();
        assert_eq!(names, vec!["late".to_owned()]);
    }

    #[test]
    fn test_delete_all_is_one_call_per_marker() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        for frame in [4, 8, 15] {
            markers.add(frame, MarkerColor::Cocoa, "m");
        }
        store.clear_calls();

        assert_eq!(markers.delete_all(), 3);
        assert!(markers.is_empty());
        assert!(store.is_empty());
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::DeleteAtFrame(4),
                StoreCall::DeleteAtFrame(8),
                StoreCall::DeleteAtFrame(15)
            ]
        );
    }

    #[test]
    fn test_invalidate_then_all_repopulates() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        markers.add(2, MarkerColor::Cream, "m");

        markers.invalidate();
        assert!(markers.get(2).is_none());

        assert_eq!(markers.all().len(), 1);
        assert!(markers.get(2).is_some());
    }

    #[test]
    fn test_display_truncates_long_collections() {
        let store = MemoryMarkerStore::new();
        let mut markers = collection(&store);
        for frame in [1, 2, 3] {
            markers.add(frame, MarkerColor::Rose, "m");
        }
        assert_eq!(markers.to_string(), "Markers(frames: 1, 2, 3)");

        for frame in [4, 5, 6] {
            markers.add(frame, MarkerColor::Rose, "m");
        }
        assert_eq!(markers.to_string(), "Markers(frames: 1, 2, ..., 5, 6)");
    }
}
