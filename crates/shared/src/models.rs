use serde::{Deserialize, Serialize};

use crate::importance::{ImportanceScores, RatingSource};

/// Editorial leaning of an outlet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lean {
    Left,
    Center,
    Right,
    #[serde(other)]
    Unknown,
}

impl Lean {
    /// Order in which leans are drawn when picking representatives
    pub const PRIORITY: [Lean; 3] = [Lean::Left, Lean::Center, Lean::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lean::Left => "left",
            Lean::Center => "center",
            Lean::Right => "right",
            Lean::Unknown => "unknown",
        }
    }
}

/// Article as handed over by the fetch/extract collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    pub source: String,
    pub lean: Lean,
    #[serde(default)]
    pub summary: String,
}

/// One ingested article, immutable once embedded
#[derive(Debug, Clone)]
pub struct Article {
    pub id: usize,
    pub url: String,
    pub title: String,
    /// Extracted full text, when extraction succeeded
    pub body: Option<String>,
    /// Feed-provided summary, always present (may be empty)
    pub summary: String,
    pub source: String,
    pub lean: Lean,
    pub embedding: Vec<f32>,
}

impl Article {
    pub fn from_record(id: usize, record: ArticleRecord, max_chars: usize) -> Self {
        let body = record
            .text
            .map(|t| truncate_chars(t.trim(), max_chars).to_string())
            .filter(|t| !t.is_empty());

        Self {
            id,
            url: record.url,
            title: record.title.trim().to_string(),
            body,
            summary: truncate_chars(record.summary.trim(), max_chars).to_string(),
            source: record.source,
            lean: record.lean,
            embedding: Vec::new(),
        }
    }

    /// Text used for embedding and scoring.
    ///
    /// The extracted body wins whenever it is non-blank; otherwise the feed
    /// summary is used, which may itself be empty.
    pub fn text(&self) -> &str {
        match &self.body {
            Some(body) if !body.trim().is_empty() => body,
            _ => &self.summary,
        }
    }
}

/// A cluster of articles judged to cover the same event
#[derive(Debug, Clone)]
pub struct StoryGroup {
    /// Position in size order after clustering
    pub rank: usize,
    /// Article ids, ascending
    pub members: Vec<usize>,
    /// Article ids chosen for viewpoint balance, a subset of `members`
    pub representatives: Vec<usize>,
    pub importance_scores: ImportanceScores,
    pub importance_average: f64,
    pub rated_by: RatingSource,
}

impl StoryGroup {
    pub fn new(rank: usize, members: Vec<usize>) -> Self {
        Self {
            rank,
            members,
            representatives: Vec::new(),
            importance_scores: ImportanceScores::default(),
            importance_average: 0.0,
            rated_by: RatingSource::Heuristic,
        }
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Source triple handed to the output collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub lean: Lean,
    pub url: String,
}

/// Ranked story as consumed by the feed/output collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryReport {
    pub story_id: String,
    pub story_key: String,
    pub title: String,
    pub summary: String,
    pub sources: Vec<SourceRef>,
    pub cluster_size: usize,
    pub importance_scores: ImportanceScores,
    pub importance_avg: f64,
    pub rated_by: RatingSource,
    pub timestamp: String,
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub articles_in: usize,
    pub unique_articles: usize,
    pub groups: usize,
    pub groups_considered: usize,
    pub kept: usize,
    pub skipped: usize,
}

/// Complete run output for serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub version: String,
    pub created_at: String,
    pub stats: RunStats,
    pub stories: Vec<StoryReport>,
}

impl RunReport {
    pub fn new(stats: RunStats, stories: Vec<StoryReport>) -> Self {
        Self {
            version: "1.0".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            stats,
            stories,
        }
    }
}

/// Cut `text` to at most `max_chars` characters, respecting UTF-8 boundaries
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: Option<&str>, summary: &str) -> ArticleRecord {
        ArticleRecord {
            url: "https://example.com/a".to_string(),
            title: "  Title  ".to_string(),
            text: text.map(str::to_string),
            source: "AP News".to_string(),
            lean: Lean::Center,
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_text_prefers_extracted_body() {
        let article = Article::from_record(0, record(Some("full body"), "rss summary"), 100);
        assert_eq!(article.text(), "full body");
        assert_eq!(article.title, "Title");
    }

    #[test]
    fn test_text_falls_back_to_summary_when_body_blank() {
        let article = Article::from_record(0, record(Some("   "), "rss summary"), 100);
        assert!(article.body.is_none());
        assert_eq!(article.text(), "rss summary");
    }

    #[test]
    fn test_text_may_be_empty() {
        let article = Article::from_record(0, record(None, ""), 100);
        assert_eq!(article.text(), "");
    }

    #[test]
    fn test_body_is_capped() {
        let article = Article::from_record(0, record(Some("abcdefgh"), ""), 4);
        assert_eq!(article.text(), "abcd");
    }

    #[test]
    fn test_truncate_chars_respects_utf8() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_unknown_lean_deserializes() {
        let json = r#"{"url":"u","title":"t","source":"s","lean":"libertarian"}"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.lean, Lean::Unknown);
        assert!(record.text.is_none());
        assert_eq!(record.summary, "");
    }

    #[test]
    fn test_extra_record_fields_are_ignored() {
        let json = r#"{"url":"u","title":"t","source":"s","lean":"left","published":"2026-02-01"}"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        let article = Article::from_record(0, record, 100);
        assert_eq!(article.lean, Lean::Left);
        assert_eq!(article.text(), "");
    }
}
