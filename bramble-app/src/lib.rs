pub mod app_config;
pub mod clients;

pub use app_config::AppConfig;
