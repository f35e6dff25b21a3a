use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ArticleRecord, RunReport};

/// Get the default directory for storing run reports
pub fn get_default_stories_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("cross-spectrum")
        .join("stories");

    fs::create_dir_all(&data_dir).context("Failed to create stories directory")?;

    Ok(data_dir)
}

/// Load the article records produced by the fetch/extract step
pub fn load_articles(filepath: &Path) -> Result<Vec<ArticleRecord>> {
    if !filepath.exists() {
        anyhow::bail!("Article file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read article file: {}", filepath.display()))?;

    serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse article JSON from {}. Expected an array of {{url, title, text, source, lean, summary}} records.",
            filepath.display()
        )
    })
}

/// Save a run report as pretty JSON, creating parent directories
pub fn save_report(report: &RunReport, filepath: &Path) -> Result<PathBuf> {
    if let Some(parent) = filepath.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;

    fs::write(filepath, json).context("Failed to write report file")?;

    Ok(filepath.to_path_buf())
}

/// Load a run report written by `save_report`
pub fn load_report(filepath: &Path) -> Result<RunReport> {
    if !filepath.exists() {
        anyhow::bail!("Report file not found: {}", filepath.display());
    }

    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read report file: {}", filepath.display()))?;

    let report: RunReport = serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse report JSON from {}. The file may be corrupted or not a valid report.",
            filepath.display()
        )
    })?;

    if report.version != "1.0" {
        anyhow::bail!(
            "Unsupported report version: {}. Expected 1.0. Please regenerate the report with rank-stories.",
            report.version
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Lean, RunStats};

    #[test]
    fn test_load_articles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("articles.json");
        fs::write(
            &path,
            r#"[{"url":"https://a.example","title":"A","text":"Body","source":"NPR","lean":"left","summary":"s"},
                {"url":"https://b.example","title":"B","source":"Fox News","lean":"right"}]"#,
        )
        .unwrap();

        let records = load_articles(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lean, Lean::Left);
        assert_eq!(records[1].text, None);
    }

    #[test]
    fn test_load_articles_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_articles(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_load_articles_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_articles(&path).is_err());
    }

    #[test]
    fn test_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stories.json");
        let stats = RunStats {
            articles_in: 3,
            unique_articles: 3,
            groups: 2,
            groups_considered: 2,
            kept: 0,
            skipped: 2,
        };

        save_report(&RunReport::new(stats.clone(), Vec::new()), &path).unwrap();
        let loaded = load_report(&path).unwrap();
        assert_eq!(loaded.stats, stats);
        assert!(loaded.stories.is_empty());
    }

    #[test]
    fn test_load_report_rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        let mut report = RunReport::new(RunStats::default(), Vec::new());
        report.version = "0.9".to_string();
        save_report(&report, &path).unwrap();
        assert!(load_report(&path).is_err());
    }
}
