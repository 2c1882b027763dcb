pub use common::utils::logging::*;
pub use common::utils::log_entry::detection::DetectionEntry;
pub use common::utils::log_entry::io::IOEntry;
pub use common::utils::log_entry::system::SystemEntry;
pub use common::{debug_entry, emergency_entry, error_entry, information_entry, warning_entry};
pub use crate::{logging_console, logging_emergency, logging_error, logging_information, logging_warning};

use lazy_static::lazy_static;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

lazy_static! {
    static ref LOGGER: RwLock<Logger> = RwLock::new(Logger::new());
}

pub struct Logger {
    system_log: Vec<LogEntry>,
}

impl Logger {
    fn new() -> Self {
        let mut system_log = Vec::new();
        let log_entry = LogEntry::new(LogLevel::Information, "Logger", "Online now", "");
        system_log.push(log_entry);
        Self {
            system_log,
        }
    }

    pub async fn instance() -> RwLockReadGuard<'static, Logger> {
        LOGGER.read().await
    }

    pub async fn instance_mut() -> RwLockWriteGuard<'static, Logger> {
        LOGGER.write().await
    }

    pub async fn add_system_log<T: Into<String>, U: Into<String>, V: Into<String>>(level: LogLevel, position: T, message: U, debug_info: V) {
        let log_entry = LogEntry::new(level, position, message, debug_info);
        Self::logging_console(log_entry.clone());
        let mut logger = Self::instance_mut().await;
        logger.system_log.push(log_entry);
    }

    pub fn logging_console(log_entry: LogEntry) {
        println!("{}", log_entry.to_colored_string());
    }

    pub async fn get_system_logs() -> Vec<LogEntry> {
        Self::instance().await.system_log.clone()
    }
}

#[macro_export]
macro_rules! logging_information {
    ($position:expr, $message:expr) => {
        Logger::add_system_log(LogLevel::Information, $position, $message, format!("{}:{}", file!(), line!())).await
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        Logger::add_system_log(LogLevel::Information, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info)).await
    };
}

#[macro_export]
macro_rules! logging_warning {
    ($position:expr, $message:expr) => {
        Logger::add_system_log(LogLevel::Warning, $position, $message, format!("{}:{}", file!(), line!())).await
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        Logger::add_system_log(LogLevel::Warning, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info)).await
    };
}

#[macro_export]
macro_rules! logging_error {
    ($position:expr, $message:expr) => {
        Logger::add_system_log(LogLevel::Error, $position, $message, format!("{}:{}", file!(), line!())).await
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        Logger::add_system_log(LogLevel::Error, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info)).await
    };
}

#[macro_export]
macro_rules! logging_emergency {
    ($position:expr, $message:expr) => {
        Logger::add_system_log(LogLevel::Emergency, $position, $message, format!("{}:{}", file!(), line!())).await
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        Logger::add_system_log(LogLevel::Emergency, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info)).await
    };
}

#[macro_export]
macro_rules! logging_console {
    ($entry:expr) => {
        Logger::logging_console($entry)
    };
}
