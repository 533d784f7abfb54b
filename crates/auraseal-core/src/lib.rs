//! AuraSeal compression, partitioning, erasure coding, and integrity seals.
//!
//! This crate implements the data plane for distributing large binaries as
//! compressed, erasure-coded, integrity-sealed parts:
//!
//! - Canonical Huffman compression with a bit-length table compact enough to
//!   embed in every part header (each part is independently decodable)
//! - Partitioning of the compressed stream into bounded-size parts with a
//!   bit-exact header/payload/footer wire layout
//! - Systematic Reed-Solomon parity over GF(2^8): any `k` of the `k + m`
//!   shards reconstruct all data shards
//! - SHA-512 integrity seals in single and dual (primary + recovery) form,
//!   plus the immutable manifest consulted by downloading clients
//!
//! # Pipeline
//!
//! Producing side: raw bytes → [`codec::encode`] → [`part::split`] →
//! [`erasure::generate_parity`] → [`integrity`] seals → [`manifest`] entry.
//! The [`pipeline`] module composes these into one call per component.
//!
//! Consuming-side reassembly (fetch, validate, recover) lives in the
//! `auraseal-assemble` crate; this crate stays synchronous and allocation-
//! bounded so it can be driven from any runtime.

#![forbid(unsafe_code)]

pub mod bitio;
pub mod codec;
pub mod config;
pub mod crc;
pub mod erasure;
mod error;
pub mod integrity;
pub mod manifest;
pub mod part;
pub mod pipeline;

pub use codec::{CodeTable, Encoded};
pub use config::PackageConfig;
pub use erasure::ErasureError;
pub use error::{CodecError, PackageError, PartError};
pub use integrity::{IntegritySeal, SealError};
pub use manifest::{ComponentRecord, Manifest, ManifestError, RecoveryRef};
pub use part::{Part, PartKind};
pub use pipeline::{package_component, recover_parts, unpack_component, PackagedComponent};
