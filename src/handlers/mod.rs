// src/handlers/mod.rs

pub mod auth;
pub mod chat;
pub mod quiz;
pub mod submission;
