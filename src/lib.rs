pub mod backend;
pub mod config;
pub mod dispatch;
pub mod monitor;
pub mod storage;
pub mod trigger;
pub mod utils;
pub mod web;

use std::{env, sync::Arc};
use dispatch::Dispatcher;
use monitor::JobMonitor;
use once_cell::sync::Lazy;
use storage::history::HistoryStore;

pub struct AppContext {
    pub dispatcher: Arc<Dispatcher>,
    pub history: Arc<dyn HistoryStore>,
    pub monitor: Arc<JobMonitor>,
}

const TRIGGER_DB_PATH: &str = "sqlite://./trigger_data/history.db?mode=rwc";
const TRIGGER_LOG_DIR: &str = "./logs";

pub static DB_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("TRIGGER_DB_PATH") {
        Ok(path) => path,
        Err(_) => {
            dotenv::var("TRIGGER_DB_PATH").unwrap_or_else(|_| TRIGGER_DB_PATH.to_string())
        }
    }
});

pub static LOG_DIR: Lazy<String> = Lazy::new(|| {
    match env::var("TRIGGER_LOG_DIR") {
        Ok(path) => path,
        Err(_) => {
            dotenv::var("TRIGGER_LOG_DIR").unwrap_or_else(|_| TRIGGER_LOG_DIR.to_string())
        }
    }
});

pub fn init_env() {
    dotenv::dotenv().ok();

    // 确保数据目录存在
    if let Some(db_path) = DB_PATH.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
}
