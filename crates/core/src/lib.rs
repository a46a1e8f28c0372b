//! askroute core library
//!
//! Foundational utilities shared by every askroute crate:
//! - Error taxonomy (`AppError`, `ErrorKind`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};
