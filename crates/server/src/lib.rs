//! Cloud dashboard backend: HTTP surface over the detection pipeline

pub mod api;
pub mod config;
