//! # API Shared
//!
//! Shared utilities and definitions for the Drive API.
//!
//! Contains:
//! - Wire types (`dto` module) with their OpenAPI schemas
//! - Shared services like `HealthService`
//! - Authentication header names and credential parsing
//!
//! Used by `api-rest`; free of any HTTP framework.

pub mod auth;
pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
