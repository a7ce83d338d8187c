//! sitereports - bulk analytics report downloader.
//!
//! Drives a headless browser through an analytics service's login and
//! export flow, stores one spreadsheet per domain, and streams progress to
//! HTTP clients as newline-delimited JSON.

pub mod browser;
pub mod cli;
pub mod client;
pub mod config;
pub mod fetcher;
pub mod models;
pub mod progress;
pub mod repository;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod utils;
