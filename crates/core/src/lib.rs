//! Core business logic for folio.
//!
//! Services sit between the HTTP layer and the repositories: they take the
//! caller's user ID explicitly, enforce the follow and visibility rules, and
//! return typed results or an [`folio_common::AppError`].

pub mod services;

pub use services::*;
