// src/services/mod.rs

pub mod analytics;
pub mod chat;
pub mod quiz;
pub mod scoring;
