use image::RgbImage;
use lazy_static::lazy_static;
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;
use crate::detection::utils::bounding_box::BoundingBox;
use common::utils::log_entry::detection::DetectionEntry;

lazy_static! {
    static ref SESSION: RwLock<Session> = RwLock::new(Session::new());
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
pub enum SessionStatus {
    NoImage,
    ImageLoaded,
    Detecting,
    Detected,
}

#[derive(Clone)]
pub struct UploadedImage {
    pub uuid: Uuid,
    pub filename: String,
    pub image: RgbImage,
}

#[derive(Clone)]
pub struct DetectionOutcome {
    pub bounding_boxes: Vec<BoundingBox>,
    pub annotated_image: RgbImage,
}

//One session per process, reset wholesale on every re-upload.
pub struct Session {
    status: SessionStatus,
    uploaded_image: Option<UploadedImage>,
    outcome: Option<DetectionOutcome>,
}

impl Session {
    fn new() -> Self {
        Self {
            status: SessionStatus::NoImage,
            uploaded_image: None,
            outcome: None,
        }
    }

    pub async fn instance() -> RwLockReadGuard<'static, Session> {
        SESSION.read().await
    }

    pub async fn instance_mut() -> RwLockWriteGuard<'static, Session> {
        SESSION.write().await
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn uploaded_image(&self) -> Option<&UploadedImage> {
        self.uploaded_image.as_ref()
    }

    pub fn outcome(&self) -> Option<&DetectionOutcome> {
        self.outcome.as_ref()
    }

    //Re-upload discards any previous detection result.
    pub fn replace_image(&mut self, uploaded_image: UploadedImage) {
        self.uploaded_image = Some(uploaded_image);
        self.outcome = None;
        self.status = SessionStatus::ImageLoaded;
    }

    pub fn begin_detection(&mut self) -> Result<RgbImage, String> {
        if self.status == SessionStatus::Detecting {
            return Err(DetectionEntry::DetectionInProgress.into());
        }
        match &self.uploaded_image {
            Some(uploaded_image) => {
                self.status = SessionStatus::Detecting;
                Ok(uploaded_image.image.clone())
            },
            None => Err(DetectionEntry::NoImageUploaded.into()),
        }
    }

    pub fn complete_detection(&mut self, outcome: DetectionOutcome) {
        self.outcome = Some(outcome);
        self.status = SessionStatus::Detected;
    }

    pub fn fail_detection(&mut self) {
        self.outcome = None;
        self.status = match self.uploaded_image {
            Some(_) => SessionStatus::ImageLoaded,
            None => SessionStatus::NoImage,
        };
    }
}
