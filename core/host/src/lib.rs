pub mod color;
pub mod memory;
pub mod parent;
pub mod record;
pub mod store;
