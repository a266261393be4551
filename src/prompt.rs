//! Prompt assembly for grounded answers.
//!
//! The model receives two messages: a fixed system instruction and a user
//! message carrying the question plus a `LIBRARY CONTEXT` block. Entry
//! content is passed through verbatim so every cited id maps to the exact
//! text the model saw.

use serde::{Deserialize, Serialize};

use crate::models::ScoredEntry;

/// Fixed instruction: persona, grounding-only rule, fallback phrase, and the
/// citation footer the model is asked to end with.
pub const SYSTEM_PROMPT: &str = "\
You are KY Golf Academy Coach Chat.
Answer ONLY using the provided library context.
If the answer is not contained in the context, say: \"Not in Kevin\u{2019}s golf library yet.\"
Be practical and concise. Use Kevin\u{2019}s cues/drills when relevant.
End with: \"Used: entry-xxx, entry-yyy\".";

/// Answer returned without calling the model when nothing in the library matches.
pub const NO_MATCH_ANSWER: &str = "That\u{2019}s not in Kevin\u{2019}s golf library yet. \
Start from the basics (grip, grip pressure, setup/posture, takeaway) or add a new entry for this topic.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// The two messages sent to the model for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: self.system.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: self.user.clone(),
            },
        ]
    }
}

/// Renders ranked entries into the context block, in ranking order.
///
/// Each entry becomes:
///
/// ```text
/// ---
/// entry-1: Grip
/// Tags: fundamentals, hands
/// Hold the club with a neutral grip.
/// ```
///
/// with a blank line between entries.
pub fn context_block(ranked: &[ScoredEntry<'_>]) -> String {
    ranked
        .iter()
        .map(|s| {
            format!(
                "---\n{}: {}\nTags: {}\n{}\n",
                s.entry.id,
                s.entry.title,
                s.entry.tags.join(", "),
                s.entry.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(question: &str, ranked: &[ScoredEntry<'_>]) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Question: {}\n\nLIBRARY CONTEXT:\n{}",
            question,
            context_block(ranked)
        ),
    }
}
