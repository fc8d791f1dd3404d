//! Middleware module
//!
//! Contains the credential gate applied to protected routes.

pub mod auth;
