use actix_web::http::header;
use actix_web::{HttpResponse, Responder};

pub async fn default_route() -> impl Responder {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/detection"))
        .finish()
}
