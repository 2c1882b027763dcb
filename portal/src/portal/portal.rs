use std::time::Duration;
use tokio::time::sleep;
use lazy_static::lazy_static;
use actix_web::{web, App, HttpServer};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::utils::config::Config;
use crate::utils::logging::*;
use crate::detection::detection_model::DetectionModel;
use crate::web::api;

lazy_static! {
    static ref PORTAL: RwLock<Portal> = RwLock::new(Portal::new());
}

pub struct Portal {
    terminate: bool,
}

impl Portal {
    fn new() -> Self {
        Self {
            terminate: false,
        }
    }

    pub async fn instance() -> RwLockReadGuard<'static, Portal> {
        PORTAL.read().await
    }

    pub async fn instance_mut() -> RwLockWriteGuard<'static, Portal> {
        PORTAL.write().await
    }

    pub async fn run() {
        Config::now().await;
        DetectionModel::run().await;
        let http_server = loop {
            let config = Config::now().await;
            let http_server = HttpServer::new(|| {
                App::new()
                    .service(api::detection::initialize())
                    .service(api::theme::initialize())
                    .service(api::javascript::initialize())
                    .service(api::log::initialize())
                    .default_service(web::route().to(api::default::default_route))
            }).bind(format!("127.0.0.1:{}", config.http_server_bind_port));
            match http_server {
                Ok(http_server) => break http_server,
                Err(err) => {
                    logging_error!("Portal", "Http service bind port failed", format!("Err: {err}"));
                    if Self::instance().await.terminate {
                        return;
                    }
                    sleep(Duration::from_millis(config.internal_timestamp)).await;
                    continue;
                },
            }
        };
        logging_information!("Portal", SystemEntry::WebReady);
        logging_information!("Portal", SystemEntry::Online);
        if let Err(err) = http_server.run().await {
            logging_emergency!("Portal", SystemEntry::WebPanic(err));
        }
    }

    pub async fn terminate() {
        logging_information!("Portal", SystemEntry::Terminating);
        Self::instance_mut().await.terminate = true;
        logging_information!("Portal", SystemEntry::TerminateComplete);
    }
}
