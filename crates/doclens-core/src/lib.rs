//! # doclens Core
//!
//! Shared, runtime-agnostic logic for doclens: the document/analysis data
//! model, content digests, the upload validator, keyword normalization, the
//! error taxonomy, and the [`store::DocumentRepository`] contract with an
//! in-memory implementation.
//!
//! This crate contains no tokio, sqlx, or network code.

pub mod digest;
pub mod error;
pub mod keywords;
pub mod models;
pub mod store;
pub mod validate;
