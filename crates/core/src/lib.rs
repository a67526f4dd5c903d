//! Core domain types, errors, and diagnostic events for `assetgate`.
//!
//! This crate establishes the foundational data structures and error handling
//! used by the resolution pipeline. It carries no networking of its own.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing all possible failure modes for predictable error handling.
//! - **`types`**: Domain newtypes such as [`types::ResourceKey`] and the
//!   revocable [`types::LocalHandle`] that the rendering layer consumes.
//! - **`events`**: Structured diagnostic events published at the resolver
//!   boundary instead of silently swallowed failures.
//! - **`constants`**: Shared environment variable names and defaults.

pub mod constants;
pub mod errors;
pub mod events;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, Result},
    events::{DiagnosticBus, ResolverEvent},
    types::{LocalHandle, ResourceKey},
};
