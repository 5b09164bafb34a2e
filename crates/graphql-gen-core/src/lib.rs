//! # graphql-gen-core
//!
//! Shared, native-I/O-free logic for the GraphQL operation generator:
//! schema parsing, document chunking, the embedding/LLM/vector-store
//! traits, the embedding service, and the dynamic operation generator.
//!
//! This crate contains no `tokio`, `sqlx`, filesystem, or other
//! native-only dependencies — every external effect is expressed as a
//! trait (`EmbeddingProvider`, `LLMProvider`, `VectorStore`,
//! `SchemaValidator`) that the `graphql-gen` app crate implements
//! concretely.

pub mod chunk;
pub mod embedding;
pub mod embedding_service;
pub mod generator;
pub mod llm;
pub mod models;
pub mod parser;
pub mod store;
