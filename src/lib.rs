//! # notiq
//!
//! A metadata-first indexing and retrieval system for a local markdown
//! note vault.
//!
//! notiq walks a vault of notes, extracts structured metadata (YAML
//! frontmatter tags, dates, content previews) into SQLite, and answers
//! natural-language questions by having a language model translate them
//! into exact-match search criteria. It can also batch-enrich notes that
//! lack frontmatter with model-generated headers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │  Vault  │──▶│ Extract  │──▶│  SQLite   │
//! │  (.md)  │   │ tags/date│   │ metadata  │
//! └────┬────┘   └──────────┘   └────┬─────┘
//!      │                           │
//!      ▼                           ▼
//! ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │ Enrich  │◀──│   LLM    │──▶│ Retrieve │
//! │ headers │   │ (Ollama) │   │ + answer │
//! └─────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! notiq init                    # create database
//! notiq index                   # extract metadata from the vault
//! notiq search "kubernetes"     # ranked matches, no synthesis
//! notiq ask "what did I do in January 2025?"
//! notiq enrich --max-workers 8  # generate missing frontmatter
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`vault`] | Note-tree enumeration |
//! | [`extract`] | Frontmatter, tag, and date extraction |
//! | [`store`] | SQLite metadata store and exact-match searches |
//! | [`llm`] | Completion backend abstraction (Ollama) |
//! | [`interpret`] | Natural-language query interpretation |
//! | [`retrieve`] | Search orchestration and answer synthesis |
//! | [`enrich`] | Batch frontmatter enrichment |
//! | [`index`] | Vault indexing pass |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod enrich;
pub mod extract;
pub mod index;
pub mod interpret;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod vault;
