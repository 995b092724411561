pub mod config;
pub mod data;
pub mod docx;
pub mod error;
pub mod filler;
pub mod progress;
