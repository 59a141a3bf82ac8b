//! History Reader: digest of what the last 14 days already covered.
//!
//! Each run persists a directory named by a sortable timestamp token
//! (`2025-10-17T14-30`) containing an `index.html`. This module scans the
//! output root for those directories, picks the most recent run for each of
//! the prior `lookback_days` calendar days, and extracts
//! `(group, title, summary)` triples from the rendered markup.
//!
//! The result is a flat text digest fed opaquely into acquisition and
//! selection prompts to discourage verbatim repeats. It is advisory context
//! for the oracle, nothing more: in-run dedup never consults it, and any
//! unreadable or malformed day is skipped without complaint.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Directory-name format for run artifacts. Minute resolution keeps names
/// sortable and unique enough for a scheduled job.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%dT%H-%M";

static GROUP_SECTION: Lazy<Selector> = Lazy::new(|| Selector::parse("section.group").unwrap());
static GROUP_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static STORY_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li.story").unwrap());
static STORY_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("strong.title").unwrap());
static STORY_SUMMARY: Lazy<Selector> = Lazy::new(|| Selector::parse("span.summary").unwrap());

/// Build the history digest for the `lookback_days` days before `as_of`.
///
/// Missing days, unreadable artifacts, and markup the extractor does not
/// recognize are all silently skipped; the digest is simply shorter. An
/// empty string means no usable history exists.
#[instrument(level = "info", skip_all, fields(root = %root.display(), %as_of, lookback_days))]
pub async fn load_history(root: &Path, as_of: NaiveDate, lookback_days: i64) -> String {
    let runs = latest_run_per_day(root);
    let mut digest = String::new();

    for offset in (1..=lookback_days).rev() {
        let day = as_of - Duration::days(offset);
        let Some(dir) = runs.get(&day) else {
            continue;
        };
        let index_path = dir.join("index.html");
        let html = match tokio::fs::read_to_string(&index_path).await {
            Ok(html) => html,
            Err(e) => {
                debug!(path = %index_path.display(), error = %e, "Skipping unreadable artifact");
                continue;
            }
        };
        for (group, title, summary) in extract_entries(&html) {
            writeln!(
                digest,
                "Day {day}: Group: {group} - Title: {title}, Summary: {summary}"
            )
            .unwrap();
        }
    }

    info!(bytes = digest.len(), "History digest assembled");
    digest.trim_end().to_string()
}

/// Map each calendar day to its most recent run directory under `root`.
///
/// Directories whose names do not parse as a run timestamp are ignored;
/// the BTreeMap ordering plus `>` comparison picks the latest run per day.
fn latest_run_per_day(root: &Path) -> BTreeMap<NaiveDate, PathBuf> {
    let mut latest: BTreeMap<NaiveDate, (NaiveDateTime, PathBuf)> = BTreeMap::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return BTreeMap::new();
    };
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Ok(stamp) = NaiveDateTime::parse_from_str(name, RUN_DIR_FORMAT) else {
            continue;
        };
        let day = stamp.date();
        let newer = match latest.get(&day) {
            Some((existing, _)) => *existing < stamp,
            None => true,
        };
        if newer {
            latest.insert(day, (stamp, entry.path()));
        }
    }
    latest.into_iter().map(|(d, (_, p))| (d, p)).collect()
}

/// Pull `(group, title, summary)` triples out of a rendered index page.
///
/// This is the only contract with the render format: `section.group`
/// blocks with an `h2` name, `li.story` entries carrying a `strong.title`
/// and a `span.summary`.
pub(crate) fn extract_entries(html: &str) -> Vec<(String, String, String)> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    for section in document.select(&GROUP_SECTION) {
        let Some(group) = section
            .select(&GROUP_NAME)
            .next()
            .map(|h| h.text().collect::<String>().trim().to_string())
        else {
            continue;
        };
        for item in section.select(&STORY_ITEM) {
            let title = item
                .select(&STORY_TITLE)
                .next()
                .map(|t| t.text().collect::<String>().trim().to_string());
            let summary = item
                .select(&STORY_SUMMARY)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string());
            if let (Some(title), Some(summary)) = (title, summary) {
                if !title.is_empty() {
                    entries.push((group.clone(), title, summary));
                }
            }
        }
    }
    entries
}
