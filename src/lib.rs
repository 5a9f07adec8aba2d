pub mod checks;
pub mod cli;
pub mod compute;
pub mod config;
pub mod db;
pub mod dma;
pub mod export;
pub mod formats;
pub mod models;
pub mod parameters;
pub mod process;
pub mod utils;
