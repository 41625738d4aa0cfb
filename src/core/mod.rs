//! # Core Infrastructure

pub mod http_client;
