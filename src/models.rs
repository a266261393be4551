//! Core data models that flow through the chat pipeline.
//!
//! [`KnowledgeEntry`] is the read-only library record, [`ScoredEntry`] is the
//! per-request ranking result that borrows it, and [`ChatRequest`] /
//! [`ChatResponse`] are the wire types of the chat endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// One curated library entry. `id` doubles as the citation token.
///
/// `title`, `tags`, and `content` may be absent or `null` in the library file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KnowledgeEntry {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A library entry paired with its relevance to the current question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry<'a> {
    pub entry: &'a KnowledgeEntry,
    pub score: u32,
}

/// Request body of `POST {chat_path}`. Only a JSON string counts as a
/// question; any other type is rejected when the body is decoded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
}

/// Response body of a successful chat call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<String>,
}
