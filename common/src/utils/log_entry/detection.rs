use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionEntry {
    #[error("Unable to load model. Check the specified path: {0}\nReason: {1}")]
    ModelLoadError(String, String),
    #[error("Detection model is not available")]
    ModelUnavailable,
    #[error("Detection is already in progress")]
    DetectionInProgress,
    #[error("No image is uploaded yet")]
    NoImageUploaded,
    #[error("No detection result is available")]
    NoResultAvailable,
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("Unable to decode image {0}\nReason: {1}")]
    ImageDecodeError(String, String),
    #[error("Confidence {0}% is outside the accepted range of 25 to 100")]
    ConfidenceOutOfRange(u8),
    #[error("Error occurred during inference: {0}")]
    InferenceError(String),
}

impl From<DetectionEntry> for String {
    #[inline(always)]
    fn from(value: DetectionEntry) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_failure_names_the_configured_path() {
        let entry = DetectionEntry::ModelLoadError("./best-final.onnx".to_string(), "file is corrupt".to_string());
        let message = String::from(entry);
        assert!(message.contains("./best-final.onnx"));
        assert!(message.contains("file is corrupt"));
    }
}
