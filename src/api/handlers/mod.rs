//! Route handlers.
//!
//! Handlers receive the shared [`auth::AuthState`] and the per-request
//! [`auth::Session`] as request extensions.

pub mod admin;
pub mod auth;
pub mod error;
pub mod health;
pub mod pages;
