use crate::portal::portal::Portal;

pub mod detection;
pub mod portal;
pub mod utils;
pub mod web;

#[actix_web::main]
async fn main() {
    Portal::run().await;
    Portal::terminate().await;
}
