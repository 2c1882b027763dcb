use colored::*;
use std::fmt::Display;
use chrono::{DateTime, Local};

pub use crate::{debug_entry, information_entry, warning_entry, error_entry, emergency_entry, logging_console};

#[derive(Copy, Clone)]
pub enum LogLevel {
    Debug,
    Information,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn to_plain_string(&self) -> String {
        match self {
            LogLevel::Debug => "Debug      ".to_string(),
            LogLevel::Information => "Information".to_string(),
            LogLevel::Notice => "Notice     ".to_string(),
            LogLevel::Warning => "Warning    ".to_string(),
            LogLevel::Error => "Error      ".to_string(),
            LogLevel::Critical => "Critical   ".to_string(),
            LogLevel::Alert => "Alert      ".to_string(),
            LogLevel::Emergency => "Emergency  ".to_string(),
        }
    }

    pub fn to_colored_string(&self) -> ColoredString {
        match self {
            LogLevel::Debug => "Debug      ".to_string().bright_black(),
            LogLevel::Information => "Information".to_string().bright_blue(),
            LogLevel::Notice => "Notice     ".to_string().bright_green(),
            LogLevel::Warning => "Warning    ".to_string().yellow(),
            LogLevel::Error => "Error      ".to_string().bright_red(),
            LogLevel::Critical => "Critical   ".to_string().bright_yellow(),
            LogLevel::Alert => "Alert      ".to_string().red(),
            LogLevel::Emergency => "Emergency  ".to_string().magenta(),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = self.to_plain_string();
        write!(f, "{}", str)
    }
}

#[derive(Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Local>,
    pub position: String,
    pub message: String,
    pub debug_info: String,
}

impl LogEntry {
    pub fn new<T: Into<String>, U: Into<String>, V: Into<String>>(level: LogLevel, position: T, message: U, debug_info: V) -> Self {
        Self {
            level,
            timestamp: Local::now(),
            position: position.into(),
            message: message.into(),
            debug_info: debug_info.into(),
        }
    }

    pub fn to_plain_string(&self) -> String {
        let level = self.level.to_plain_string();
        let timestamp = self.timestamp.format("%Y/%m/%d %H:%M:%S").to_string();
        let position = self.position.clone();
        let message = self.message.clone();
        if self.debug_info.is_empty() {
            format!("[{}] {} {}: {}", level, timestamp, position, message)
        } else {
            format!("[{}] {} {}: {}\n{}", level, timestamp, position, message, self.debug_info)
        }
    }

    pub fn to_colored_string(&self) -> String {
        let level = self.level.to_colored_string();
        let timestamp = self.timestamp.format("%Y/%m/%d %H:%M:%S").to_string();
        let position = self.position.cyan();
        let message = self.message.white();
        if self.debug_info.is_empty() {
            format!("[{}] {} {}: {}", level, timestamp, position, message)
        } else {
            let debug_info = self.debug_info.bright_black();
            format!("[{}] {} {}: {}\n{}", level, timestamp, position, message, debug_info)
        }
    }
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = self.to_plain_string();
        write!(f, "{}", str)
    }
}

pub fn logging_console(log_entry: LogEntry) {
    println!("{}", log_entry.to_colored_string());
}

#[macro_export]
macro_rules! debug_entry {
    ($position:expr, $message:expr) => {
        LogEntry::new(LogLevel::Debug, $position, $message, "")
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        LogEntry::new(LogLevel::Debug, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info))
    };
}

#[macro_export]
macro_rules! information_entry {
    ($position:expr, $message:expr) => {
        LogEntry::new(LogLevel::Information, $position, $message, "")
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        LogEntry::new(LogLevel::Information, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info))
    };
}

#[macro_export]
macro_rules! warning_entry {
    ($position:expr, $message:expr) => {
        LogEntry::new(LogLevel::Warning, $position, $message, "")
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        LogEntry::new(LogLevel::Warning, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info))
    };
}

#[macro_export]
macro_rules! error_entry {
    ($position:expr, $message:expr) => {
        LogEntry::new(LogLevel::Error, $position, $message, "")
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        LogEntry::new(LogLevel::Error, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info))
    };
}

#[macro_export]
macro_rules! emergency_entry {
    ($position:expr, $message:expr) => {
        LogEntry::new(LogLevel::Emergency, $position, $message, "")
    };
    ($position:expr, $message:expr, $debug_info:expr) => {
        LogEntry::new(LogLevel::Emergency, $position, $message, format!("{}:{} {}", file!(), line!(), $debug_info))
    };
}

#[macro_export]
macro_rules! logging_console {
    ($log_entry:expr) => {
        common::utils::logging::logging_console($log_entry);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_entry_contains_level_position_and_message() {
        let entry = LogEntry::new(LogLevel::Error, "Config", "Configuration not found", "");
        let rendered = entry.to_plain_string();
        assert!(rendered.contains("Error"));
        assert!(rendered.contains("Config: Configuration not found"));
    }

    #[test]
    fn debug_info_is_rendered_on_a_second_line() {
        let entry = LogEntry::new(LogLevel::Warning, "Portal", "Bind failed", "Err: in use");
        let rendered = entry.to_plain_string();
        assert!(rendered.ends_with("\nErr: in use"));
    }
}
