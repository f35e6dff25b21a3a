//! Seven-criterion importance scoring of story groups.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ImportanceConfig};
use crate::models::{truncate_chars, Article};
use crate::openai::OpenAiClient;

pub mod heuristic;
pub mod rater;

pub use heuristic::HeuristicEstimator;
pub use rater::{ExternalRater, ImportanceRater};

/// Per-article body chars included in a group's text bundle
const BUNDLE_BODY_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Impact,
    Conflict,
    Ramifications,
    Accountability,
    InformedPublic,
    CitizenResponsibility,
    Transparency,
}

impl Criterion {
    pub const ALL: [Criterion; 7] = [
        Criterion::Impact,
        Criterion::Conflict,
        Criterion::Ramifications,
        Criterion::Accountability,
        Criterion::InformedPublic,
        Criterion::CitizenResponsibility,
        Criterion::Transparency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Impact => "impact",
            Criterion::Conflict => "conflict",
            Criterion::Ramifications => "ramifications",
            Criterion::Accountability => "accountability",
            Criterion::InformedPublic => "informed_public",
            Criterion::CitizenResponsibility => "citizen_responsibility",
            Criterion::Transparency => "transparency",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criterion scores, each in [0, 10]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportanceScores(BTreeMap<Criterion, f64>);

impl ImportanceScores {
    /// Clamp `value` to [0, 10], round to one decimal and store it
    pub fn set(&mut self, criterion: Criterion, value: f64) {
        self.0.insert(criterion, round_to(clamp_score(value), 1));
    }

    pub fn get(&self, criterion: Criterion) -> Option<f64> {
        self.0.get(&criterion).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weighted mean over the criteria present in these scores.
    ///
    /// Weights for criteria that are not scored are ignored, and a scored
    /// criterion without a weight counts with weight 0.
    pub fn weighted_average(&self, weights: &BTreeMap<String, f64>) -> f64 {
        let mut total_weight = 0.0;
        let mut sum = 0.0;
        for (criterion, score) in self.iter() {
            let weight = weights.get(criterion.as_str()).copied().unwrap_or(0.0);
            total_weight += weight;
            sum += score * weight;
        }
        if total_weight == 0.0 {
            total_weight = 1.0;
        }
        round_to(clamp_score(sum / total_weight), 2)
    }

    /// Whether every criterion reaches `floor`
    pub fn passes_floor(&self, floor: f64) -> bool {
        self.0.values().all(|v| *v >= floor)
    }
}

impl fmt::Display for ImportanceScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(c, v)| format!("{}={:.1}", c, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Which estimator produced a group's scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSource {
    Heuristic,
    External,
}

impl RatingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingSource::Heuristic => "heuristic",
            RatingSource::External => "external",
        }
    }
}

/// Scores plus their weighted reduction
#[derive(Debug, Clone)]
pub struct Rating {
    pub scores: ImportanceScores,
    pub average: f64,
    pub source: RatingSource,
}

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 10.0)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Title plus capped body of every member, joined and capped at `cap_chars`
pub fn group_text(members: &[usize], articles: &[Article], cap_chars: usize) -> String {
    let mut parts = Vec::with_capacity(members.len() * 2);
    for &id in members {
        let article = &articles[id];
        parts.push(article.title.as_str());
        parts.push(truncate_chars(article.text(), BUNDLE_BODY_CHARS));
    }
    truncate_chars(&parts.join("\n"), cap_chars).to_string()
}

/// Scores groups with the external rater when allowed, else heuristically
pub struct ImportanceScorer {
    heuristic: HeuristicEstimator,
    rater: Option<Arc<dyn ImportanceRater>>,
    config: ImportanceConfig,
}

impl ImportanceScorer {
    pub fn new(config: ImportanceConfig, rater: Option<Arc<dyn ImportanceRater>>) -> Self {
        Self {
            heuristic: HeuristicEstimator::new(),
            rater,
            config,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let rater: Option<Arc<dyn ImportanceRater>> = match &config.api {
            Some(api) if config.external_rater_enabled() => {
                let client = OpenAiClient::new(api.clone(), &config.retry)?;
                Some(Arc::new(ExternalRater::new(
                    client,
                    config.importance.model.clone(),
                    config.retry,
                )))
            }
            _ => None,
        };

        Ok(Self::new(config.importance.clone(), rater))
    }

    /// Score the group at position `rank` in size order
    pub async fn score(&self, rank: usize, members: &[usize], articles: &[Article]) -> Rating {
        if let Some(rater) = &self.rater {
            if rank < self.config.rater_top_n {
                tracing::info!(cluster = rank + 1, "external importance rating");
                let bundle = group_text(members, articles, self.config.bundle_chars);
                match rater.rate(&bundle).await {
                    Ok(scores) => return self.rating(scores, RatingSource::External),
                    Err(e) => {
                        tracing::info!(
                            cluster = rank + 1,
                            error = %e,
                            "external rating failed, falling back to heuristics"
                        );
                    }
                }
            }
        }

        let scores = self.heuristic.estimate(members, articles);
        self.rating(scores, RatingSource::Heuristic)
    }

    /// Whether a rated group clears the importance floor
    pub fn admits(&self, rating: &Rating) -> bool {
        rating.average >= self.config.min_avg_importance
            && rating.scores.passes_floor(self.config.min_any_criterion)
    }

    fn rating(&self, scores: ImportanceScores, source: RatingSource) -> Rating {
        let average = scores.weighted_average(&self.config.weights);
        Rating {
            scores,
            average,
            source,
        }
    }
}
