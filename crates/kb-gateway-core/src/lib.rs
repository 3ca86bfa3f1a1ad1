//! # kb-gateway core
//!
//! Shared, I/O-free logic for kb-gateway: wire types for the managed
//! knowledge-base API, citation resolution, the static model catalog, the
//! [`KnowledgeBase`](backend::KnowledgeBase) trait, and the client-side
//! conversation and URL-form state used by the chat client.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies.

pub mod backend;
pub mod catalog;
pub mod citation;
pub mod conversation;
pub mod datasource;
pub mod generate;
pub mod url_form;
