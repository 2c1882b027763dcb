pub mod annotator;
pub mod detection_model;
pub mod utils;
pub mod yolo_detector;
