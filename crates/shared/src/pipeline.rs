//! Linear run orchestration: ingest, embed, cluster, score and filter,
//! pick representatives.
//!
//! Nothing here returns an error. Remote failures degrade to local
//! fallbacks inside the components, and an empty input ends the run early.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::cache::{article_key, story_key, summary_key, Cache};
use crate::clustering::SimilarityClusterer;
use crate::config::Config;
use crate::digest::StoryDigest;
use crate::embedding::EmbeddingProvider;
use crate::importance::ImportanceScorer;
use crate::models::{truncate_chars, Article, ArticleRecord, RunStats, StoryGroup, StoryReport};
use crate::representatives::RepresentativeSelector;

/// Last state a run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingested,
    Embedded,
    Clustered,
    ScoredAndFiltered,
    Represented,
    Done,
}

/// Result of one run
#[derive(Debug)]
pub struct RunOutcome {
    pub stage: Stage,
    /// Ingested articles, indexed by id
    pub articles: Vec<Article>,
    /// Surviving groups in size order
    pub groups: Vec<StoryGroup>,
    pub stats: RunStats,
}

impl RunOutcome {
    fn empty(stage: Stage, stats: RunStats) -> Self {
        Self {
            stage,
            articles: Vec::new(),
            groups: Vec::new(),
            stats,
        }
    }

    pub fn representatives(&self, group: &StoryGroup) -> Vec<&Article> {
        group
            .representatives
            .iter()
            .map(|&id| &self.articles[id])
            .collect()
    }
}

pub struct Pipeline {
    config: Config,
    embedder: EmbeddingProvider,
    clusterer: SimilarityClusterer,
    scorer: ImportanceScorer,
    selector: RepresentativeSelector,
    cache: Option<Arc<dyn Cache>>,
}

impl Pipeline {
    pub fn new(config: Config, embedder: EmbeddingProvider, scorer: ImportanceScorer) -> Self {
        Self {
            clusterer: SimilarityClusterer::new(config.cluster.clone()),
            selector: RepresentativeSelector::new(config.max_reps_per_lean),
            config,
            embedder,
            scorer,
            cache: None,
        }
    }

    /// Wire every component from `config`, building HTTP clients for the
    /// remote backends that are enabled
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = EmbeddingProvider::from_config(&config)?;
        let scorer = ImportanceScorer::from_config(&config)?;
        Ok(Self::new(config, embedder, scorer))
    }

    /// Attach the store used for article text and story summaries
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Deduplicate by url and assign ids in surviving order
    pub fn ingest(&self, records: Vec<ArticleRecord>) -> Vec<Article> {
        let mut seen = HashSet::new();
        let mut articles = Vec::with_capacity(records.len());

        for record in records {
            if record.url.trim().is_empty() {
                tracing::warn!(title = %record.title, "skipping article without url");
                continue;
            }
            if !seen.insert(record.url.clone()) {
                tracing::debug!(url = %record.url, "duplicate article dropped");
                continue;
            }

            let mut article = Article::from_record(articles.len(), record, self.config.max_text_extract);
            if let Some(cache) = &self.cache {
                let key = article_key(&article.url);
                match &article.body {
                    Some(body) => cache.put(&key, body.clone()),
                    None => {
                        if let Some(cached) = cache.get(&key).filter(|t| !t.trim().is_empty()) {
                            tracing::debug!(url = %article.url, "article text from cache");
                            article.body =
                                Some(truncate_chars(&cached, self.config.max_text_extract).to_string());
                        }
                    }
                }
            }
            articles.push(article);
        }

        articles
    }

    pub async fn run(&self, records: Vec<ArticleRecord>) -> RunOutcome {
        let mut stats = RunStats {
            articles_in: records.len(),
            ..RunStats::default()
        };

        let mut articles = self.ingest(records);
        stats.unique_articles = articles.len();
        tracing::info!(
            stage = ?Stage::Ingested,
            articles_in = stats.articles_in,
            unique = stats.unique_articles,
            "articles ingested"
        );
        if articles.is_empty() {
            tracing::warn!("no articles to cluster");
            return RunOutcome::empty(Stage::Ingested, stats);
        }

        let text_chars = self.config.embedding.text_chars;
        let texts: Vec<String> = articles
            .iter()
            .map(|a| format!("{} {}", a.title, truncate_chars(a.text(), text_chars)))
            .collect();
        let embeddings = self.embedder.embed(&texts).await;
        for (article, embedding) in articles.iter_mut().zip(embeddings) {
            article.embedding = embedding;
        }
        tracing::info!(stage = ?Stage::Embedded, articles = articles.len(), "articles embedded");

        let vectors: Vec<&[f32]> = articles.iter().map(|a| a.embedding.as_slice()).collect();
        let mut clusters = self.clusterer.cluster(&vectors);
        stats.groups = clusters.len();
        clusters.truncate(self.config.max_groups);
        stats.groups_considered = clusters.len();
        tracing::info!(
            stage = ?Stage::Clustered,
            groups = stats.groups,
            considered = stats.groups_considered,
            "articles clustered"
        );

        let concurrency = self.config.scoring_concurrency.max(1);
        let articles_ref = &articles;
        let rated: Vec<(StoryGroup, _)> = stream::iter(clusters.into_iter().enumerate())
            .map(|(rank, members)| async move {
                let rating = self.scorer.score(rank, &members, articles_ref).await;
                (StoryGroup::new(rank, members), rating)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut groups = Vec::with_capacity(rated.len());
        for (mut group, rating) in rated {
            if !self.scorer.admits(&rating) {
                tracing::info!(
                    cluster = group.rank + 1,
                    size = group.size(),
                    average = rating.average,
                    scores = %rating.scores,
                    "skipping cluster below importance floor"
                );
                stats.skipped += 1;
                continue;
            }
            group.importance_scores = rating.scores;
            group.importance_average = rating.average;
            group.rated_by = rating.source;
            groups.push(group);
        }
        tracing::info!(
            stage = ?Stage::ScoredAndFiltered,
            kept = groups.len(),
            skipped = stats.skipped,
            "clusters scored"
        );

        groups.retain_mut(|group| {
            group.representatives = self.selector.select(&group.members, &articles);
            if group.representatives.is_empty() {
                tracing::warn!(cluster = group.rank + 1, "cluster has no representatives");
                stats.skipped += 1;
                return false;
            }
            true
        });
        stats.kept = groups.len();
        tracing::debug!(stage = ?Stage::Represented, groups = stats.kept, "representatives selected");

        tracing::info!(
            stage = ?Stage::Done,
            articles = stats.unique_articles,
            groups = stats.groups,
            kept = stats.kept,
            skipped = stats.skipped,
            "run complete"
        );

        RunOutcome {
            stage: Stage::Done,
            articles,
            groups,
            stats,
        }
    }

    /// Turn surviving groups into output records.
    ///
    /// A summary cached under the story key wins over the local digest.
    pub fn reports(&self, outcome: &RunOutcome, now: DateTime<Utc>) -> Vec<StoryReport> {
        let model = &self.config.importance.model;

        outcome
            .groups
            .iter()
            .map(|group| {
                let reps = outcome.representatives(group);
                let key = story_key(&reps);

                let cached = self
                    .cache
                    .as_ref()
                    .and_then(|cache| cache.get(&summary_key(&key, model)))
                    .filter(|s| !s.trim().is_empty());
                let summary = match cached {
                    Some(text) => {
                        tracing::debug!(story_key = %key, "summary from cache");
                        StoryDigest::with_sources_block(&text, &reps)
                    }
                    None => StoryDigest::generate(&reps, now),
                };

                StoryReport {
                    story_id: format!("story_{}_{}", group.rank, now.format("%Y%m%d")),
                    story_key: key,
                    title: StoryDigest::title(&reps),
                    summary,
                    sources: StoryDigest::sources(&reps),
                    cluster_size: group.size(),
                    importance_scores: group.importance_scores.clone(),
                    importance_avg: group.importance_average,
                    rated_by: group.rated_by,
                    timestamp: now.to_rfc3339(),
                }
            })
            .collect()
    }
}
