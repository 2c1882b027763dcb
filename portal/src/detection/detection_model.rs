use image::RgbImage;
use lazy_static::lazy_static;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::detection::utils::bounding_box::BoundingBox;
use crate::detection::utils::confidence::ConfidenceThreshold;
use crate::detection::yolo_detector::YoloDetector;
use crate::utils::config::Config;
use crate::utils::logging::*;

lazy_static! {
    static ref DETECTION_MODEL: RwLock<DetectionModel> = RwLock::new(DetectionModel::new());
}

///The capability surface the portal consumes; the artifact behind it stays opaque.
pub trait Detector: Send + Sync {
    fn predict(&mut self, image: &RgbImage, threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String>;
}

//Loaded once at startup. Load failure leaves the handle unusable but the
//process alive; detect requests check is_usable before touching it.
pub struct DetectionModel {
    detector: Option<Box<dyn Detector>>,
    load_error: Option<String>,
}

impl DetectionModel {
    fn new() -> Self {
        Self {
            detector: None,
            load_error: None,
        }
    }

    pub async fn instance() -> RwLockReadGuard<'static, DetectionModel> {
        DETECTION_MODEL.read().await
    }

    pub async fn instance_mut() -> RwLockWriteGuard<'static, DetectionModel> {
        DETECTION_MODEL.write().await
    }

    pub async fn run() {
        logging_information!("Detection Model", SystemEntry::Initializing);
        let config = Config::now().await;
        let model_filepath = config.model_filepath.clone();
        match YoloDetector::load(&model_filepath, &config.class_names) {
            Ok(detector) => {
                Self::instance_mut().await.detector = Some(Box::new(detector));
                logging_information!("Detection Model", SystemEntry::InitializeComplete, format!("Model: {model_filepath}"));
            },
            Err(err) => {
                let error_message = String::from(DetectionEntry::ModelLoadError(model_filepath, err));
                Self::instance_mut().await.load_error = Some(error_message.clone());
                logging_error!("Detection Model", error_message);
            },
        }
    }

    pub async fn is_usable() -> bool {
        Self::instance().await.detector.is_some()
    }

    pub async fn load_error() -> Option<String> {
        Self::instance().await.load_error.clone()
    }

    //Serialized through the write lock, one inference at a time.
    pub async fn predict(image: &RgbImage, threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String> {
        Self::instance_mut().await.infer(image, threshold)
    }

    pub fn infer(&mut self, image: &RgbImage, threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String> {
        match self.detector.as_mut() {
            Some(detector) => detector.predict(image, threshold),
            None => Err(DetectionEntry::ModelUnavailable.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    //Fixed candidate scores, filtered by the threshold the way the real model does.
    struct StubDetector {
        scores: Vec<f32>,
    }

    impl Detector for StubDetector {
        fn predict(&mut self, _image: &RgbImage, threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String> {
            let bounding_boxes = self.scores.iter()
                .filter(|score| **score >= threshold.fraction())
                .map(|score| BoundingBox {
                    xmin: 0,
                    xmax: 10,
                    ymin: 0,
                    ymax: 10,
                    name: "Early Blight".to_string(),
                    confidence: *score as f64,
                })
                .collect();
            Ok(bounding_boxes)
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn predict(&mut self, _image: &RgbImage, _threshold: ConfidenceThreshold) -> Result<Vec<BoundingBox>, String> {
            Err("tensor shape mismatch".to_string())
        }
    }

    #[test]
    fn unusable_model_refuses_inference() {
        let mut model = DetectionModel::new();
        let threshold = ConfidenceThreshold::from_percent(60).unwrap();
        let error = model.infer(&RgbImage::new(4, 4), threshold).unwrap_err();
        assert!(error.contains("not available"));
    }

    #[test]
    fn loaded_model_filters_by_threshold() {
        let mut model = DetectionModel::new();
        model.detector = Some(Box::new(StubDetector { scores: vec![0.9, 0.7, 0.5, 0.3] }));
        let threshold = ConfidenceThreshold::from_percent(60).unwrap();
        let bounding_boxes = model.infer(&RgbImage::new(4, 4), threshold).unwrap();
        assert_eq!(bounding_boxes.len(), 2);
    }

    #[test]
    fn loosening_the_threshold_never_reduces_the_count() {
        let mut model = DetectionModel::new();
        model.detector = Some(Box::new(StubDetector { scores: vec![0.9, 0.7, 0.5, 0.3] }));
        let strict = ConfidenceThreshold::from_percent(60).unwrap();
        let loose = ConfidenceThreshold::from_percent(25).unwrap();
        let strict_count = model.infer(&RgbImage::new(4, 4), strict).unwrap().len();
        let loose_count = model.infer(&RgbImage::new(4, 4), loose).unwrap().len();
        assert!(loose_count >= strict_count);
        assert_eq!(strict_count, 2);
        assert_eq!(loose_count, 4);
    }

    #[test]
    fn detector_failure_is_reported_as_error() {
        let mut model = DetectionModel::new();
        model.detector = Some(Box::new(FailingDetector));
        let threshold = ConfidenceThreshold::from_percent(60).unwrap();
        assert!(model.infer(&RgbImage::new(4, 4), threshold).is_err());
    }
}
