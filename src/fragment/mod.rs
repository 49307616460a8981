//! Fragment entity model
//!
//! A fragment is one owner-scoped, typed unit of stored content: a flat
//! metadata record plus a byte payload kept in sync with it.

pub mod handler;
pub mod model;
pub mod types;

pub use model::Fragment;
pub use types::{FragmentRecord, Listing};
