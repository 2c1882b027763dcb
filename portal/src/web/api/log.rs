use actix_web::{get, web, HttpResponse, Responder, Scope};
use crate::utils::logging::Logger;

pub fn initialize() -> Scope {
    web::scope("/log")
        .service(system_log)
}

#[get("/system_log")]
async fn system_log() -> impl Responder {
    let system_log = Logger::get_system_logs().await
        .into_iter().map(|log| log.to_plain_string()).collect::<Vec<String>>();
    HttpResponse::Ok().json(system_log)
}
