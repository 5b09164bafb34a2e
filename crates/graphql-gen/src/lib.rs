//! # graphql-gen
//!
//! CLI and concrete provider implementations over [`graphql_gen_core`]:
//! ingest a GraphQL schema into a SQLite-backed vector store, then generate
//! operations dynamically from natural-language input.
//!
//! ## Architecture
//!
//! ```text
//! SDL ──▶ parser ──▶ chunk ──▶ embedding_service ──▶ SqliteVectorStore
//!                                                         │
//!                                  query text ──▶ generator ──▶ operation
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | `VectorStore` implementation over SQLite |
//! | [`embedding`] | OpenAI-compatible `EmbeddingClient` implementation |
//! | [`llm`] | OpenAI-compatible `LLMProvider` implementation |
//!
//! ## Configuration
//!
//! `gqlgen` is configured via a TOML file (default: `./gqlgen.toml`). See
//! [`config`] for all available options and [`config::load_config`] for
//! validation rules.

pub mod config;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod migrate;
pub mod sqlite_store;

pub use graphql_gen_core as core;
