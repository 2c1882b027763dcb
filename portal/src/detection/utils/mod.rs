pub mod bounding_box;
pub mod confidence;
pub mod session;
