//! Cache collaborator contract and story-key hashing.
//!
//! Persistent storage lives outside this crate; the pipeline only needs
//! `get`/`put` and computes every key itself.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::Article;

/// Key/value store shared across runs, last writer wins
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
}

/// In-process cache with an optional time-to-live
pub struct MemoryCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            ttl: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        let (stored_at, value) = entries.get(key)?;
        match self.ttl {
            Some(ttl) if stored_at.elapsed() > ttl => None,
            _ => Some(value.clone()),
        }
    }

    fn put(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (Instant::now(), value));
        }
    }
}

#[derive(Serialize)]
struct KeyEntry<'a> {
    u: &'a str,
    t: &'a str,
}

/// Stable hash of a representative set, independent of input order
pub fn story_key(representatives: &[&Article]) -> String {
    let mut reps: Vec<&Article> = representatives.to_vec();
    reps.sort_by(|a, b| a.url.cmp(&b.url));

    let payload: Vec<KeyEntry> = reps
        .iter()
        .map(|a| KeyEntry {
            u: &a.url,
            t: &a.title,
        })
        .collect();
    // Serializing borrowed strings into a Vec cannot fail
    let blob = serde_json::to_string(&payload).unwrap_or_default();

    hex::encode(Sha256::digest(blob.as_bytes()))
}

/// Key for a cached story summary produced by `model`
pub fn summary_key(story_key: &str, model: &str) -> String {
    format!("summary:{}:{}", model, story_key)
}

/// Key for cached article text
pub fn article_key(url: &str) -> String {
    format!("article:{}", url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, Lean};

    fn article(id: usize, url: &str, title: &str) -> Article {
        Article::from_record(
            id,
            ArticleRecord {
                url: url.to_string(),
                title: title.to_string(),
                text: None,
                source: "AP News".to_string(),
                lean: Lean::Center,
                summary: String::new(),
            },
            100,
        )
    }

    #[test]
    fn test_story_key_ignores_order() {
        let a = article(0, "https://b.example/1", "Budget passes");
        let b = article(1, "https://a.example/2", "Council approves budget");
        assert_eq!(story_key(&[&a, &b]), story_key(&[&b, &a]));
        assert_eq!(story_key(&[&a, &b]).len(), 64);
    }

    #[test]
    fn test_story_key_depends_on_titles() {
        let a = article(0, "https://a.example/1", "Budget passes");
        let a_retitled = article(0, "https://a.example/1", "Budget fails");
        assert_ne!(story_key(&[&a]), story_key(&[&a_retitled]));
    }

    #[test]
    fn test_story_key_matches_compact_json_hash() {
        let a = article(0, "https://a.example/1", "Budget");
        let expected = hex::encode(Sha256::digest(br#"[{"u":"https://a.example/1","t":"Budget"}]"#));
        assert_eq!(story_key(&[&a]), expected);
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").is_none());
        cache.put("k", "v1".to_string());
        cache.put("k", "v2".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("v2"));
    }

    #[test]
    fn test_memory_cache_expires() {
        let cache = MemoryCache::with_ttl(Duration::from_millis(0));
        cache.put("k", "v".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }
}
