//! Library crate for volley-scorer-back, exposing modules for binaries and integration tests.

pub mod config;
pub mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
