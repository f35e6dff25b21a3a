use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shared::{
    get_default_stories_dir, load_articles, load_report, save_report, Config, MemoryCache,
    Pipeline, RunReport, StoryReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rank-stories")]
#[command(about = "Cluster news articles into stories and rank them by civic importance")]
struct Args {
    /// JSON file of extracted articles ({url, title, text, source, lean, summary})
    #[arg(short, long, required_unless_present = "show")]
    input: Option<PathBuf>,

    /// Where to write the ranked stories (defaults to the local data directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print a previously saved report instead of running the pipeline
    #[arg(long, conflicts_with = "input")]
    show: Option<PathBuf>,

    /// Cosine similarity needed to treat two articles as the same story
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Smallest cluster kept as a multi-article story
    #[arg(long)]
    min_cluster_size: Option<usize>,

    /// Minimum weighted importance average for a story to be kept
    #[arg(long)]
    min_importance: Option<f64>,

    /// Minimum score every individual criterion must reach (0 disables)
    #[arg(long)]
    min_criterion: Option<f64>,

    /// Never call remote embedding or rating services
    #[arg(long)]
    local_only: bool,

    /// Log per-article detail
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn validate_threshold(threshold: f64) -> Result<f64> {
    if !(threshold > 0.0 && threshold < 1.0) {
        anyhow::bail!(
            "Invalid threshold: {}. Use a cosine similarity between 0 and 1 (exclusive)",
            threshold
        );
    }
    Ok(threshold)
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env();

    if let Some(threshold) = args.threshold {
        config.cluster.similarity_threshold = validate_threshold(threshold)?;
    }
    if let Some(size) = args.min_cluster_size {
        config.cluster.min_cluster_size = size;
    }
    if let Some(min) = args.min_importance {
        config.importance.min_avg_importance = min;
    }
    if let Some(min) = args.min_criterion {
        config.importance.min_any_criterion = min;
    }
    if args.local_only {
        config = config.local_only();
    }

    Ok(config)
}

fn print_stories(stories: &[StoryReport]) {
    if stories.is_empty() {
        println!("No stories cleared the importance floor.");
        return;
    }

    for (i, story) in stories.iter().enumerate() {
        println!(
            "\n{}. {} ({} articles, importance {:.2}, {})",
            i + 1,
            story.title,
            story.cluster_size,
            story.importance_avg,
            story.rated_by.as_str()
        );
        println!("   {}", story.importance_scores);
        for source in &story.sources {
            println!("   - [{}] {}: {}", source.lean.as_str(), source.name, source.url);
        }
    }
}

fn show_report(path: &Path) -> Result<()> {
    let report = load_report(path)?;
    println!("📖 Report from {}", report.created_at);
    println!(
        "   {} articles in, {} unique, {} clusters, {} kept",
        report.stats.articles_in,
        report.stats.unique_articles,
        report.stats.groups,
        report.stats.kept
    );
    print_stories(&report.stories);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Some(path) = &args.show {
        return show_report(path);
    }

    let input = args
        .input
        .as_deref()
        .context("An input file is required")?;

    let config = build_config(&args)?;
    tracing::debug!(
        threshold = config.cluster.similarity_threshold,
        min_cluster_size = config.cluster.min_cluster_size,
        min_importance = config.importance.min_avg_importance,
        remote_embeddings = config.remote_embeddings_enabled(),
        external_rater = config.external_rater_enabled(),
        "configuration loaded"
    );
    if config.api.is_none() {
        println!("⚠ OPENAI_API_KEY not set, using local embeddings and heuristic scoring");
    }

    println!("📚 Loading articles from {}...", input.display());
    let records = load_articles(input)?;
    println!("✓ Loaded {} articles", records.len());

    println!("\n🔗 Clustering and scoring stories...");
    let pipeline = Pipeline::from_config(config).context("Failed to set up pipeline")?;
    let cache = MemoryCache::with_ttl(pipeline.config().cache_ttl());
    let pipeline = pipeline.with_cache(Arc::new(cache));
    let now = Utc::now();
    let outcome = pipeline.run(records).await;
    let stories = pipeline.reports(&outcome, now);

    println!(
        "✓ {} clusters from {} unique articles, {} kept, {} skipped",
        outcome.stats.groups,
        outcome.stats.unique_articles,
        outcome.stats.kept,
        outcome.stats.skipped
    );

    let output = match args.output {
        Some(path) => path,
        None => get_default_stories_dir()?
            .join(format!("stories-{}.json", now.format("%Y-%m-%d-%H%M%S"))),
    };

    print_stories(&stories);

    let report = RunReport::new(outcome.stats, stories);
    let saved = save_report(&report, &output).context("Failed to save stories")?;

    println!("\n✅ Stories saved to: {}", saved.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_threshold_accepts_open_interval() {
        assert_eq!(validate_threshold(0.6).unwrap(), 0.6);
        assert!(validate_threshold(0.01).is_ok());
        assert!(validate_threshold(0.99).is_ok());
    }

    #[test]
    fn test_validate_threshold_rejects_out_of_range() {
        for bad in [0.0, -0.5, 1.0, 1.5, f64::NAN] {
            assert!(validate_threshold(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_build_config_rejects_bad_threshold() {
        let args = Args::try_parse_from(["rank-stories", "--input", "articles.json", "--threshold", "1.5"])
            .unwrap();
        assert!(build_config(&args).is_err());

        let args = Args::try_parse_from(["rank-stories", "--input", "articles.json", "--threshold", "0.7"])
            .unwrap();
        assert_eq!(build_config(&args).unwrap().cluster.similarity_threshold, 0.7);
    }
}
