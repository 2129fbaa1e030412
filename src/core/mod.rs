//! Configuration, request/response models and credential handling

pub mod config;
pub mod models;
pub mod secret;
