use chrono::{DateTime, Utc};

use crate::models::{truncate_chars, Article, Lean, SourceRef};

/// Chars of joined representative text shown as key points
const KEY_POINT_CHARS: usize = 700;

pub struct StoryDigest;

impl StoryDigest {
    /// Headline for a story: the first representative's title
    pub fn title(representatives: &[&Article]) -> String {
        representatives
            .first()
            .map(|a| a.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "News Story".to_string())
    }

    /// Deterministic local digest of a story's representatives
    pub fn generate(representatives: &[&Article], date: DateTime<Utc>) -> String {
        let title = Self::title(representatives);
        let mut digest = String::new();

        digest.push_str("**Who:** Multiple parties\n");
        digest.push_str(&format!("**What:** {}\n", truncate_chars(&title, 60)));
        digest.push_str("**Where:** -\n");
        digest.push_str(&format!("**When:** {}\n", date.format("%Y-%m-%d")));
        digest.push_str("**Why:** -\n\n");

        let count = |lean: Lean| representatives.iter().filter(|a| a.lean == lean).count();
        digest.push_str(&format!(
            "**Coverage Balance:** Left {} | Center {} | Right {}\n\n",
            count(Lean::Left),
            count(Lean::Center),
            count(Lean::Right)
        ));

        let key_text = representatives
            .iter()
            .map(|a| a.text())
            .collect::<Vec<_>>()
            .join(" ");
        digest.push_str(&format!(
            "**Key Points:**\n{}...",
            truncate_chars(&key_text, KEY_POINT_CHARS)
        ));

        Self::with_sources_block(&digest, representatives)
    }

    /// Append the source links block unless `summary` already has one
    pub fn with_sources_block(summary: &str, representatives: &[&Article]) -> String {
        if summary.contains("Sources:\n-") {
            return summary.to_string();
        }

        let mut out = summary.to_string();
        out.push_str("\n\nSources:\n");
        let lines: Vec<String> = representatives
            .iter()
            .map(|a| format!("- {}", a.url))
            .collect();
        out.push_str(&lines.join("\n"));
        out
    }

    pub fn sources(representatives: &[&Article]) -> Vec<SourceRef> {
        representatives
            .iter()
            .map(|a| SourceRef {
                name: a.source.clone(),
                lean: a.lean,
                url: a.url.clone(),
            })
            .collect()
    }
}
