// log_* macros live here
pub mod utils;

pub mod commands;
pub mod db;
pub mod models;
pub mod segmentation;
pub mod sensing;
pub mod settings;
pub mod upload;
