//! Common utilities and shared types for folio.
//!
//! This crate provides foundational components used across all folio crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID identifiers and bearer tokens via [`IdGenerator`]
//! - **Partial updates**: [`Patch`] for request fields that may be omitted
//! - **Storage**: Blob storage for post attachments
//!
//! # Example
//!
//! ```no_run
//! use folio_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     println!("{} -> {}", config.server.url, id_gen.generate());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod patch;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use patch::Patch;
pub use storage::{LocalStorage, NoOpStorage, StorageBackend, generate_storage_key};
