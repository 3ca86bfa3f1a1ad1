//! # kb-gateway
//!
//! An HTTP gateway and terminal chat client for a managed
//! knowledge-base retrieval-and-generation service.
//!
//! The gateway answers questions against a fixed knowledge base, manages
//! the web-crawler data source feeding it, and re-syncs data sources on a
//! schedule or when new documents land in the document bucket.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌──────────────────┐
//! │ kbg chat │──▶│  gateway (axum)      │──▶│ managed service  │
//! │ (client) │   │ access ▸ handlers    │   │ (SigV4 REST)     │
//! └──────────┘   └──────────┬───────────┘   └──────────────────┘
//!                           │  ▲
//!                  schedule │  │ object-created events
//!                           ▼  │
//!                       ┌──────────┐
//!                       │  ingest  │
//!                       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbg --config ./config/kbg.toml serve        # start the gateway
//! kbg chat --base-url http://127.0.0.1:8787   # talk to it
//! kbg ask "Where are the new offices?"        # one-shot question
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`sigv4`] | Request signing |
//! | [`bedrock`] | Managed-service client |
//! | [`query`] | Question answering |
//! | [`sources`] | Web data source create/read/update/delete |
//! | [`ingest`] | Scheduled and event-driven ingestion |
//! | [`access`] | IP allow-list and throttle |
//! | [`server`] | Gateway HTTP server |
//! | [`client`] | Gateway HTTP client |
//! | [`chat`] | Terminal chat client |
//!
//! Domain types and I/O-free logic live in the `kb-gateway-core` crate.

pub mod access;
pub mod bedrock;
pub mod chat;
pub mod client;
pub mod config;
pub mod ingest;
pub mod query;
pub mod server;
pub mod sigv4;
pub mod sources;
