//! Fragments - owner-scoped typed content storage with format conversion
//!
//! An authenticated owner stores typed byte payloads ("fragments"), reads
//! them back verbatim or converted to a related representation, and manages
//! their lifecycle over a small REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       HTTP API (axum)                        │
//! │   basic auth ──► owner id ──► /v1/fragments handlers         │
//! └──────────────┬──────────────────────────────┬────────────────┘
//!                │                              │ :id.ext
//! ┌──────────────▼──────────────┐   ┌───────────▼────────────────┐
//! │      Fragment entity        │   │     Conversion engine      │
//! │  validation, set_data,      │   │  markdown / html / json    │
//! │  rollback, monotonic stamps │   │  raster transcodes         │
//! └──────────────┬──────────────┘   └────────────────────────────┘
//!                │
//! ┌──────────────▼──────────────────────────────────────────────┐
//! │   FragmentStore (per-key locks) ──► StorageBackend          │
//! │                                     memory │ fs             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`format`]: Supported formats and the legal conversion table
//! - [`fragment`]: The fragment entity, wire types and HTTP handlers
//! - [`storage`]: Storage contract and the memory/filesystem backends
//! - [`convert`]: Format conversion engine
//! - [`auth`]: Basic-auth owner resolution
//! - [`api`]: Router assembly and response envelopes
//! - [`config`]: Configuration management

pub mod api;
pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod fragment;
pub mod storage;

pub use config::FragmentsConfig;
pub use error::{Error, Result};
pub use format::Format;
pub use fragment::{Fragment, FragmentRecord, Listing};
pub use storage::{FragmentStore, StorageBackend};
