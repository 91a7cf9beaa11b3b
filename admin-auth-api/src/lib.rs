//! # admin-auth-api
//!
//! Shared API types for the admin-auth session service.
//! This crate is designed to be WASM-compatible and can be used in both
//! the backend (Rust) and the admin dashboard frontend.
//!
//! ## Features
//!
//! - Request DTOs (RegisterRequest, LoginRequest, RefreshTokenRequest, etc.)
//! - Response DTOs (UserResponse, LoginResponse, SessionResponse, etc.)
//! - Error response format (ErrorResponse)
//!
//! ## Example
//!
//! ```rust
//! use admin_auth_api::LoginRequest;
//!
//! let request = LoginRequest {
//!     email: "user@example.com".to_string(),
//!     password: "password123".to_string(),
//! };
//! ```

pub mod error;
pub mod requests;
pub mod responses;

// Re-exports for convenient access
pub use error::ErrorResponse;
pub use requests::*;
pub use responses::*;
