//! Concurrent part fetching, validation, recovery, and component assembly.
//!
//! This crate is the consuming side of the AuraSeal pipeline. Parts arrive
//! through a [`PartSource`] (the delivery abstraction over
//! `GET /packages/{name}/parts/{n}`), are validated against the wire layout
//! and the per-part acceptance threshold, recovered through parity when
//! corrupt or missing, and finally decoded and checked against the
//! component's manifest seal.
//!
//! # Concurrency
//!
//! Parts of one component are fetched and validated concurrently, bounded by
//! a shared semaphore; parity is fetched only when recovery is actually
//! needed. All of a component's part futures live inside its `assemble`
//! future, so dropping that future cancels every outstanding fetch without
//! touching sibling components. The manifest is read-only and `Arc`-shared.

#![forbid(unsafe_code)]

pub mod assembler;
pub mod config;
mod error;
pub mod source;
pub mod state;

pub use assembler::Assembler;
pub use config::AssemblyConfig;
pub use error::AssemblyError;
pub use source::{MemorySource, PartSource, SourceError};
pub use state::{AssemblyStats, PartPhase};
