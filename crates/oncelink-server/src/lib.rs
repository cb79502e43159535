//! oncelink-server
//!
//! HTTP delivery gateway over `oncelink-core`.

pub mod cli;
pub mod http;
pub mod logging;
pub mod pages;

pub use http::{AppState, router};
