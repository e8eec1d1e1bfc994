//! # Middleware Module
//!
//! Cross-cutting hooks run by the dispatcher around every request.

mod core;
mod tracing;

pub use core::Middleware;
pub use tracing::TracingMiddleware;
