use std::fs;
use tokio::sync::RwLock;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use crate::utils::logging::*;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

#[derive(Debug, Deserialize)]
struct ConfigTable {
    #[serde(rename = "Config")]
    config: Config,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub internal_timestamp: u64, //milliseconds
    pub http_server_bind_port: u16, //port
    pub model_filepath: String, //path
    pub background_filepath: String, //path
    pub font_path: String, //path
    pub font_size: f32, //points
    pub border_width: u32, //pixels
    pub border_color: [u8; 3], //RGB
    pub text_color: [u8; 3], //RGB
    pub class_names: Vec<String>, //model output labels
}

impl Config {
    pub fn new() -> Self {
        //Seriously, the program must be terminated.
        match fs::read_to_string("./portal.toml") {
            Ok(toml_string) => {
                match toml::from_str::<ConfigTable>(&toml_string) {
                    Ok(config_table) => {
                        let config = config_table.config;
                        if !Self::validate(&config) {
                            logging_console!(emergency_entry!("Config", SystemEntry::InvalidConfig));
                            panic!("Invalid configuration file");
                        }
                        config
                    },
                    Err(err) => {
                        logging_console!(emergency_entry!("Config", "Unable to parse configuration file", format!("Err: {err}")));
                        panic!("Unable to parse configuration file");
                    },
                }
            },
            Err(err) => {
                logging_console!(emergency_entry!("Config", SystemEntry::ConfigNotFound, format!("Err: {err}")));
                panic!("Configuration file not found");
            },
        }
    }

    pub async fn now() -> Config {
        CONFIG.read().await.clone()
    }

    pub fn validate(config: &Config) -> bool {
        Config::validate_mini_second(config.internal_timestamp)
            && Config::validate_file_path(&config.model_filepath)
            && Config::validate_font_size(config.font_size)
            && Config::validate_border_width(config.border_width)
            && Config::validate_class_names(&config.class_names)
    }

    fn validate_mini_second(second: u64) -> bool {
        second <= 60000
    }

    fn validate_file_path(path: &str) -> bool {
        !path.trim().is_empty()
    }

    fn validate_border_width(width: u32) -> bool {
        width > 0_u32
    }

    fn validate_font_size(size: f32) -> bool {
        size > 0_f32
    }

    fn validate_class_names(class_names: &[String]) -> bool {
        !class_names.is_empty() && class_names.iter().all(|name| !name.trim().is_empty())
    }
}
