//! Image operations backed by the vision library

pub mod fast;
pub mod flow;
pub mod remap;
pub mod tracking;

pub use fast::detect_fast;
pub use flow::dense_flow;
pub use remap::remap_image;
pub use tracking::track_points;
