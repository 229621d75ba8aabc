//! services/api/src/lib.rs
//!
//! The storybook API service: adapters for the generative backends, the
//! export renderers, and the Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod export;
pub mod web;
