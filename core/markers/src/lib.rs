pub mod collection;
pub mod constants;
pub mod error;
pub mod marker;
pub mod selector;

pub use host::{
    color::{self, MarkerColor, ParseColorError},
    parent::ParentKind,
    record::Frame,
    store::MarkerStore,
};
