//! HTTP handlers for all routes.

pub mod sample;
pub mod system;
pub mod train;
pub mod upload;
