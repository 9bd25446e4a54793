//! Application service layer - inspection workflows, config, scanning, sync

pub mod app;
pub mod config;
pub mod repository;
pub mod scanner;
