use std::rc::Rc;

use host::memory::MemoryMarkerStore;
use log::info;
use markers::{
    MarkerColor, ParentKind, collection::MarkerCollection, marker::NewMarker,
    selector::MarkerSelector,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // A 10 second timeline at 24 fps
    let timeline = Rc::new(MemoryMarkerStore::with_length(240));
    let mut markers = MarkerCollection::new(ParentKind::Timeline, Rc::clone(&timeline));

    markers.add_with(NewMarker::new(10, MarkerColor::Blue, "Intro").custom_data("shot-1"));
    markers.add_with(NewMarker::new(96, MarkerColor::Red, "Fix audio").note("pop at cut"));
    markers.add_with(NewMarker::new(150, MarkerColor::Blue, "Outro").custom_data("shot-2"));

    // Occupied without overwrite: skipped
    markers.add(10, MarkerColor::Green, "Intro again");
    // Runs past the end of the timeline: rejected by the host
    markers.add_with(NewMarker::new(230, MarkerColor::Yellow, "Too long").duration(48));

    if let Some(mut marker) = markers.get_mut(96) {
        if let Err(e) = marker.set_color(MarkerColor::Green) {
            info!("Recolor failed: {e}");
        }
    }

    if let Some(marker) = markers.find("shot-2") {
        info!("Found {marker}");
    }

    match markers.delete(MarkerSelector::custom_data("shot-1")) {
        Ok(deleted) => info!("Deleted by custom data: {deleted}"),
        Err(e) => info!("Delete failed: {e}"),
    }

    info!("{markers} after {} host calls", timeline.calls().len());
    info!("Deleted {} remaining markers", markers.delete_all());
}
