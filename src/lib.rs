pub mod advice;
pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod report;
pub mod types;
