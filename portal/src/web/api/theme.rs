use actix_files::NamedFile;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder, Scope};
use crate::utils::config::Config;
use crate::web::utils::response::OperationStatus;

pub fn initialize() -> Scope {
    web::scope("/theme")
        .service(background)
}

//Decorative only. A missing asset is a non-fatal banner on the page, nothing more.
#[get("/background")]
async fn background(request: HttpRequest) -> impl Responder {
    let config = Config::now().await;
    let background_filepath = config.background_filepath;
    match NamedFile::open_async(&background_filepath).await {
        Ok(file) => file.into_response(&request),
        Err(err) => {
            let error_message = format!("Background image not found at {background_filepath}.\nReason: {err}");
            HttpResponse::NotFound().json(OperationStatus::new(false, Some(error_message)))
        },
    }
}
