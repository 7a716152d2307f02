//! # docsync core
//!
//! Shared, I/O-free logic for docsync: the document model, MDX sectioning,
//! slug generation, the store abstraction, the embedding trait, and the
//! checksum-driven reconciler.
//!
//! This crate contains no tokio runtime, sqlx, or filesystem access. The
//! `docsync` application crate supplies the concrete store (SQLite), the
//! embedding client (OpenAI), and the directory walker.
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──▶ document::ParsedDocument ──▶ meta::extract_meta_export
//!                      │
//!                      ▼ strip
//!            document::StrippedDocument ──▶ section::process_sections
//!                                                   │
//!                                                   ▼
//!                                       models::DocumentRecord
//!                                                   │
//!                                                   ▼
//!                         reconcile::Reconciler (Store + Embedder)
//! ```

pub mod document;
pub mod embedding;
pub mod meta;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod section;
pub mod slug;
pub mod store;
