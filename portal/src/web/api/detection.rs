use std::io::Cursor;
use std::path::Path;
use uuid::Uuid;
use image::{ImageFormat, RgbImage};
use actix_multipart::Multipart;
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use futures::{StreamExt, TryStreamExt};
use actix_web::{get, post, web, HttpResponse, Responder, Scope};
use crate::detection::annotator;
use crate::detection::detection_model::DetectionModel;
use crate::detection::utils::bounding_box::BoundingBox;
use crate::detection::utils::confidence::ConfidenceThreshold;
use crate::detection::utils::session::{DetectionOutcome, Session, SessionStatus, UploadedImage};
use crate::utils::logging::*;
use crate::utils::static_files::StaticFiles;
use crate::web::utils::response::OperationStatus;

pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

pub fn initialize() -> Scope {
    web::scope("/detection")
        .service(page)
        .service(upload_image)
        .service(detect_objects)
        .service(status)
        .service(result)
        .service(original_image)
        .service(annotated_image)
}

#[get("")]
async fn page() -> impl Responder {
    let html = StaticFiles::get("html/detection.html").expect("File not found in static files.").data;
    HttpResponse::Ok().content_type("text/html").body(html)
}

#[post("/upload")]
async fn upload_image(mut payload: Multipart) -> impl Responder {
    let uuid = Uuid::new_v4();
    while let Ok(Some(mut field)) = payload.try_next().await {
        let content_disposition = match field.content_disposition() {
            Some(content_disposition) => content_disposition,
            None => return HttpResponse::BadRequest().json(OperationStatus::new(false, Some("Invalid payload.".to_string()))),
        };
        let (field_name, file_name) = match (content_disposition.get_name(), content_disposition.get_filename()) {
            (Some(field_name), Some(file_name)) => (field_name.to_string(), sanitize(file_name)),
            _ => return HttpResponse::BadRequest().json(OperationStatus::new(false, Some("Invalid payload.".to_string()))),
        };
        if field_name != "imageFile" {
            continue;
        }
        if file_name.is_empty() {
            return HttpResponse::BadRequest().json(OperationStatus::new(false, Some("Invalid filename.".to_string())));
        }
        let file_extension = Path::new(&file_name).extension()
            .and_then(|os_str| os_str.to_str()).unwrap_or("").to_lowercase();
        if !accepted_extension(&file_extension) {
            let error_message = String::from(DetectionEntry::UnsupportedExtension(file_extension));
            return HttpResponse::BadRequest().json(OperationStatus::new(false, Some(error_message)));
        }
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(_) => return HttpResponse::InternalServerError().json(OperationStatus::new(false, None)),
            }
        }
        let image = match image::load_from_memory(&data) {
            Ok(image) => image.to_rgb8(),
            Err(err) => {
                let error_message = String::from(DetectionEntry::ImageDecodeError(file_name, err.to_string()));
                logging_warning!("Detection API", error_message.clone());
                return HttpResponse::BadRequest().json(OperationStatus::new(false, Some(error_message)));
            },
        };
        Session::instance_mut().await.replace_image(UploadedImage { uuid, filename: file_name.clone(), image });
        logging_information!("Detection API", format!("Image {file_name} accepted"), format!("Upload: {uuid}"));
        return HttpResponse::Ok().json(OperationStatus::new(true, None));
    }
    HttpResponse::BadRequest().json(OperationStatus::new(false, Some("No image file in payload.".to_string())))
}

#[derive(Deserialize)]
struct DetectRequest {
    confidence: u8, //percent, slider position
}

#[derive(Serialize)]
struct BoundingBoxEntry {
    name: String,
    confidence: f64,
    xywh: [u32; 4],
}

#[derive(Serialize)]
struct DetectionReport {
    success: bool,
    bounding_boxes: Vec<BoundingBoxEntry>,
}

impl DetectionReport {
    fn new(bounding_boxes: &[BoundingBox]) -> Self {
        let bounding_boxes = bounding_boxes.iter()
            .map(|bounding_box| BoundingBoxEntry {
                name: bounding_box.name.clone(),
                confidence: bounding_box.confidence,
                xywh: bounding_box.xywh(),
            })
            .collect();
        Self {
            success: true,
            bounding_boxes,
        }
    }
}

//actix drops the handler future when the client disconnects mid-request; without
//this the session would stay parked at Detecting until the next upload.
struct DetectionReset {
    armed: bool,
}

impl DetectionReset {
    fn new() -> Self {
        Self {
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DetectionReset {
    fn drop(&mut self) {
        if self.armed {
            tokio::spawn(async {
                Session::instance_mut().await.fail_detection();
            });
        }
    }
}

//One inference per button press. Preconditions are surfaced as messages, and an
//inference failure drops the session back to ImageLoaded instead of propagating.
#[post("/detect")]
async fn detect_objects(request: web::Json<DetectRequest>) -> impl Responder {
    if Session::instance().await.uploaded_image().is_none() {
        return HttpResponse::BadRequest().json(OperationStatus::new(false, Some(String::from(DetectionEntry::NoImageUploaded))));
    }
    if !DetectionModel::is_usable().await {
        let error_message = DetectionModel::load_error().await
            .unwrap_or_else(|| String::from(DetectionEntry::ModelUnavailable));
        return HttpResponse::ServiceUnavailable().json(OperationStatus::new(false, Some(error_message)));
    }
    let threshold = match ConfidenceThreshold::from_percent(request.confidence) {
        Ok(threshold) => threshold,
        Err(error_message) => return HttpResponse::BadRequest().json(OperationStatus::new(false, Some(error_message))),
    };
    let image = match Session::instance_mut().await.begin_detection() {
        Ok(image) => image,
        Err(error_message) => return HttpResponse::BadRequest().json(OperationStatus::new(false, Some(error_message))),
    };
    let mut reset = DetectionReset::new();
    let bounding_boxes = match DetectionModel::predict(&image, threshold).await {
        Ok(bounding_boxes) => bounding_boxes,
        Err(err) => {
            reset.disarm();
            Session::instance_mut().await.fail_detection();
            let error_message = String::from(DetectionEntry::InferenceError(err));
            logging_error!("Detection API", error_message.clone());
            return HttpResponse::InternalServerError().json(OperationStatus::new(false, Some(error_message)));
        },
    };
    let annotated = match annotator::annotate(&image, &bounding_boxes).await {
        Ok(annotated) => annotated,
        Err(error_message) => {
            reset.disarm();
            Session::instance_mut().await.fail_detection();
            logging_error!("Detection API", error_message.clone());
            return HttpResponse::InternalServerError().json(OperationStatus::new(false, Some(error_message)));
        },
    };
    let report = DetectionReport::new(&bounding_boxes);
    logging_information!("Detection API", format!("Detection completed with {count} objects", count = bounding_boxes.len()));
    Session::instance_mut().await.complete_detection(DetectionOutcome { bounding_boxes, annotated_image: annotated });
    reset.disarm();
    HttpResponse::Ok().json(report)
}

#[derive(Serialize)]
struct PortalStatus {
    model_usable: bool,
    model_error: Option<String>,
    session_status: SessionStatus,
}

#[get("/status")]
async fn status() -> impl Responder {
    let portal_status = PortalStatus {
        model_usable: DetectionModel::is_usable().await,
        model_error: DetectionModel::load_error().await,
        session_status: Session::instance().await.status(),
    };
    web::Json(portal_status)
}

#[get("/result")]
async fn result() -> impl Responder {
    let session = Session::instance().await;
    match session.outcome() {
        Some(outcome) => HttpResponse::Ok().json(DetectionReport::new(&outcome.bounding_boxes)),
        None => {
            let message = match session.uploaded_image() {
                Some(_) => String::from(DetectionEntry::NoResultAvailable),
                None => String::from(DetectionEntry::NoImageUploaded),
            };
            HttpResponse::Ok().json(OperationStatus::new(false, Some(message)))
        },
    }
}

#[get("/image/original")]
async fn original_image() -> impl Responder {
    let session = Session::instance().await;
    match session.uploaded_image() {
        Some(uploaded_image) => png_response(&uploaded_image.image),
        None => HttpResponse::NotFound().json(OperationStatus::new(false, Some(String::from(DetectionEntry::NoImageUploaded)))),
    }
}

#[get("/image/annotated")]
async fn annotated_image() -> impl Responder {
    let session = Session::instance().await;
    match session.outcome() {
        Some(outcome) => png_response(&outcome.annotated_image),
        None => HttpResponse::NotFound().json(OperationStatus::new(false, Some(String::from(DetectionEntry::NoResultAvailable)))),
    }
}

fn accepted_extension(extension: &str) -> bool {
    ACCEPTED_IMAGE_EXTENSIONS.contains(&extension)
}

fn png_response(image: &RgbImage) -> HttpResponse {
    let mut buffer = Cursor::new(Vec::new());
    match image.write_to(&mut buffer, ImageFormat::Png) {
        Ok(_) => HttpResponse::Ok().content_type("image/png").body(buffer.into_inner()),
        Err(err) => HttpResponse::InternalServerError().json(OperationStatus::new(false, Some(format!("Unable to encode image.\nReason: {err}")))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_exactly_the_supported_extensions() {
        for extension in ACCEPTED_IMAGE_EXTENSIONS {
            assert!(accepted_extension(extension));
        }
        assert!(!accepted_extension("gif"));
        assert!(!accepted_extension("mp4"));
        assert!(!accepted_extension("onnx"));
        assert!(!accepted_extension(""));
    }

    #[test]
    fn report_entry_count_matches_detection_count() {
        let bounding_boxes = vec![
            BoundingBox { xmin: 0, xmax: 10, ymin: 0, ymax: 10, name: "Early Blight".to_string(), confidence: 0.9 },
            BoundingBox { xmin: 20, xmax: 40, ymin: 20, ymax: 60, name: "Late Blight".to_string(), confidence: 0.7 },
            BoundingBox { xmin: 5, xmax: 15, ymin: 5, ymax: 15, name: "Healthy".to_string(), confidence: 0.6 },
        ];
        let report = DetectionReport::new(&bounding_boxes);
        assert!(report.success);
        assert_eq!(report.bounding_boxes.len(), 3);
        assert_eq!(report.bounding_boxes[1].xywh, [30, 40, 20, 40]);
    }

    #[test]
    fn report_serializes_with_the_fields_the_page_reads() {
        let bounding_boxes = vec![
            BoundingBox { xmin: 10, xmax: 30, ymin: 40, ymax: 100, name: "Early Blight".to_string(), confidence: 0.87 },
        ];
        let value = serde_json::to_value(DetectionReport::new(&bounding_boxes)).unwrap();
        assert_eq!(value["success"], serde_json::json!(true));
        assert_eq!(value["bounding_boxes"][0]["name"], "Early Blight");
        assert_eq!(value["bounding_boxes"][0]["confidence"], 0.87);
        assert_eq!(value["bounding_boxes"][0]["xywh"], serde_json::json!([20, 70, 20, 60]));
    }

    //Exercises the global session on purpose; the other session tests stay local.
    #[tokio::test]
    async fn dropped_detection_releases_the_session() {
        Session::instance_mut().await.replace_image(UploadedImage {
            uuid: Uuid::new_v4(),
            filename: "leaf.jpg".to_string(),
            image: RgbImage::new(4, 4),
        });
        Session::instance_mut().await.begin_detection().unwrap();
        assert_eq!(Session::instance().await.status(), SessionStatus::Detecting);
        drop(DetectionReset::new());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(Session::instance().await.status(), SessionStatus::ImageLoaded);
    }
}
