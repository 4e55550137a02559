use std::{rc::Rc, sync::Arc};

use crate::record::{Frame, RemoteMarker, RemoteMarkers};

/// The marker surface a host entity exposes to scripts.
///
/// The contract is coarse: there is no read-after-write guarantee and the only
/// field that can be changed in place is the custom data tag. Every mutating
/// call reports success as a plain `bool`, the same way the host does.
pub trait MarkerStore {
    /// Full current marker set of the parent entity.
    fn markers(&self) -> RemoteMarkers;

    /// Fails when the frame or duration does not fit the parent.
    fn add_marker(&self, frame: Frame, marker: &RemoteMarker) -> bool;

    fn delete_marker_at_frame(&self, frame: Frame) -> bool;

    /// Removes **every** marker with the given color.
    fn delete_markers_by_color(&self, color: &str) -> bool;

    /// Removes the first marker tagged with `custom_data`. Which one is "first"
    /// is up to the host.
    fn delete_marker_by_custom_data(&self, custom_data: &str) -> bool;

    fn update_marker_custom_data(&self, frame: Frame, custom_data: &str) -> bool;

    /// Ground-truth lookup by tag, bypassing any local cache.
    fn marker_by_custom_data(&self, custom_data: &str) -> RemoteMarkers;

    /// Custom data of the marker at `frame`, empty when there is none.
    fn marker_custom_data(&self, frame: Frame) -> String;
}

// Shared handles forward to the store they point at, so a parent entity and its
// marker collection can hold the same remote handle.
macro_rules! forward_marker_store {
    ($($handle:ty),+ $(,)?) => {
        $(
            impl<S: MarkerStore + ?Sized> MarkerStore for $handle {
                fn markers(&self) -> RemoteMarkers {
                    (**self).markers()
                }

                fn add_marker(&self, frame: Frame, marker: &RemoteMarker) -> bool {
                    (**self).add_marker(frame, marker)
                }

                fn delete_marker_at_frame(&self, frame: Frame) -> bool {
                    (**self).delete_marker_at_frame(frame)
                }

                fn delete_markers_by_color(&self, color: &str) -> bool {
                    (**self).delete_markers_by_color(color)
                }

                fn delete_marker_by_custom_data(&self, custom_data: &str) -> bool {
                    (**self).delete_marker_by_custom_data(custom_data)
                }

                fn update_marker_custom_data(&self, frame: Frame, custom_data: &str) -> bool {
                    (**self).update_marker_custom_data(frame, custom_data)
                }

                fn marker_by_custom_data(&self, custom_data: &str) -> RemoteMarkers {
                    (**self).marker_by_custom_data(custom_data)
                }

                fn marker_custom_data(&self, frame: Frame) -> String {
                    (**self).marker_custom_data(frame)
                }
            }
        )+
    };
}

forward_marker_store!(&S, Box<S>, Rc<S>, Arc<S>);
