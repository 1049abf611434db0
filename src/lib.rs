pub mod app;
pub mod cli;
pub mod config;
pub mod extract;
pub mod jobs;
pub mod logging;
pub mod portal;
pub mod scrape;
pub mod state;
pub mod utils;
pub mod web;
