//! # docsync
//!
//! Keeps an embedding store in sync with a tree of markdown/MDX documents.
//!
//! Every run walks the docs root, splits each document into heading-delimited
//! sections with stable slugs, and compares each file's content checksum with
//! what the store holds. New and changed files are re-embedded and replaced
//! atomically, unchanged files only get their refresh stamp updated, and
//! files that disappeared from disk are removed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │  walk.rs    │──▶│  sources.rs  │──▶│ Reconciler │──▶│  SQLite  │
//! │ parent_path │   │ parse+section│   │  (core)    │   │ files +  │
//! └─────────────┘   └──────────────┘   └─────┬──────┘   │embeddings│
//!                                            │          └──────────┘
//!                                            ▼
//!                                      ┌──────────┐
//!                                      │  OpenAI  │
//!                                      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`action`] | Host inputs, status lines, failure reports |
//! | [`config`] | TOML configuration parsing |
//! | [`walk`] | Directory listing with parent-path inheritance |
//! | [`sources`] | Markdown discovery and document records |
//! | [`embedding`] | OpenAI embeddings client |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` |
//! | [`sync`] | The sync run and its summary |
//! | [`stats`] / [`get`] | Read-only views of the store |
//! | [`db`] / [`migrate`] | Database connection and schema |

pub mod action;
pub mod config;
pub mod db;
pub mod embedding;
pub mod get;
pub mod migrate;
pub mod progress;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
pub mod sync;
pub mod walk;
