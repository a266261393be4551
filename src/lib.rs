//! # Golf Coach
//!
//! A grounded coaching chat over a small curated golf library.
//!
//! Questions are matched against the library with a lexical overlap score,
//! the best entries are handed to a hosted language model as the only
//! permitted context, and the answer comes back with the ids of the entries
//! it was grounded on. The whole site can sit behind a single shared
//! Basic-Auth credential.
//!
//! ## Architecture
//!
//! ```text
//!  request ──▶ ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//!              │ Access Gate │──▶│ Chat service │──▶│ Knowledge │  (fetched fresh)
//!              │ (Basic-Auth)│   └──────┬───────┘   └───────────┘
//!              └─────────────┘          │
//!                                       ▼
//!                     normalize ─▶ score ─▶ rank ─▶ prompt ─▶ model
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! coach --config ./config/coach.toml serve
//! coach --config ./config/coach.toml rank "How do I grip the club?"
//! coach --config ./config/coach.toml ask "How do I grip the club?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Library entries and chat wire types |
//! | [`search`] | Normalizer, scorer, and ranker |
//! | [`prompt`] | System instruction and context block assembly |
//! | [`knowledge`] | Fresh-per-request library loading (HTTP or file) |
//! | [`inference`] | Model backends and answer extraction |
//! | [`chat`] | Chat endpoint controller |
//! | [`error`] | Chat error taxonomy and HTTP mapping |
//! | [`auth`] | Basic-Auth access gate |
//! | [`server`] | HTTP server |

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod inference;
pub mod knowledge;
pub mod models;
pub mod prompt;
pub mod search;
pub mod server;
