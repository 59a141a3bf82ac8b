//! Rolling archive index: the last 14 days of runs, newest first.
//!
//! `archive.html` is rebuilt from the run-directory listing on every run
//! rather than appended to. The listing is the source of truth, which
//! makes the archive idempotent: re-running after a crash, or twice in a
//! minute, produces the same page. Run directories that fall out of the
//! window drop off the page; their files stay on disk.

use crate::history::RUN_DIR_FORMAT;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use html_escape::encode_text;
use std::error::Error;
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Rebuild `archive.html` under `root` from the run directories found
/// there, keeping runs from the `lookback_days`-day window ending on
/// `as_of`.
#[instrument(level = "info", skip_all, fields(root = %root.display(), %as_of))]
pub async fn update_archive(
    root: &Path,
    as_of: NaiveDate,
    lookback_days: i64,
) -> Result<(), Box<dyn Error>> {
    let runs = runs_in_window(root, as_of, lookback_days);

    let mut page = String::new();
    writeln!(page, "<!DOCTYPE html>").unwrap();
    writeln!(page, "<html lang=\"en\">").unwrap();
    writeln!(
        page,
        "<head><meta charset=\"utf-8\"><title>Briefing archive</title></head>"
    )
    .unwrap();
    writeln!(page, "<body>").unwrap();
    writeln!(page, "<h1>Briefing archive</h1>").unwrap();
    writeln!(page, "<ul class=\"runs\">").unwrap();
    for (stamp, name) in &runs {
        writeln!(
            page,
            "<li class=\"run\"><a href=\"./{}/index.html\">{}</a></li>",
            encode_text(name),
            stamp.format("%Y-%m-%d %H:%M"),
        )
        .unwrap();
    }
    writeln!(page, "</ul>").unwrap();
    writeln!(page, "</body>").unwrap();
    writeln!(page, "</html>").unwrap();

    fs::write(root.join("archive.html"), page).await?;
    info!(runs = runs.len(), "Rebuilt archive index");
    Ok(())
}

/// Run directories under `root` within the lookback window, newest first.
///
/// The window is today plus the `lookback_days` strictly prior days, the
/// same days the history digest draws from.
fn runs_in_window(
    root: &Path,
    as_of: NaiveDate,
    lookback_days: i64,
) -> Vec<(NaiveDateTime, String)> {
    let cutoff = as_of - Duration::days(lookback_days);
    let mut runs: Vec<(NaiveDateTime, String)> = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return runs;
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
        if stamp.date() > cutoff && stamp.date() <= as_of {
            runs.push((stamp, name.to_string()));
        }
    }
    runs.sort_by(|a, b| b.0.cmp(&a.0));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(root: &Path, name: &str) {
        std::fs::create_dir_all(root.join(name)).unwrap();
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    #[tokio::test]
    async fn test_archive_lists_window_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        make_run(dir.path(), "2025-10-17T06-30");
        make_run(dir.path(), "2025-10-10T06-30");
        make_run(dir.path(), "2025-09-20T06-30"); // outside window
        make_run(dir.path(), "junk");

        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let html = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        let newest = html.find("2025-10-17T06-30").unwrap();
        let older = html.find("2025-10-10T06-30").unwrap();
        assert!(newest < older);
        assert!(!html.contains("2025-09-20"));
        assert!(!html.contains("junk"));
    }

    #[tokio::test]
    async fn test_archive_rebuild_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        make_run(dir.path(), "2025-10-16T06-30");

        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let second = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_entries_fall_off_on_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        make_run(dir.path(), "2025-10-05T06-30");
        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let html = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        assert!(html.contains("2025-10-05T06-30"));

        // two weeks later the same run is outside the window
        let later = NaiveDate::from_ymd_opt(2025, 10, 25).unwrap();
        update_archive(dir.path(), later, 14).await.unwrap();
        let html = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        assert!(!html.contains("2025-10-05T06-30"));
        // the directory itself is untouched
        assert!(dir.path().join("2025-10-05T06-30").is_dir());
    }

    // A run exactly lookback_days old has already aged out, matching the
    // 14 days the history digest covers.
    #[tokio::test]
    async fn test_window_spans_exactly_lookback_days() {
        let dir = tempfile::tempdir().unwrap();
        make_run(dir.path(), "2025-10-03T06-30"); // 14 days before as_of
        make_run(dir.path(), "2025-10-04T06-30"); // 13 days before as_of
        make_run(dir.path(), "2025-10-17T06-30");

        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let html = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        assert!(!html.contains("2025-10-03T06-30"));
        assert!(html.contains("2025-10-04T06-30"));
        assert!(html.contains("2025-10-17T06-30"));
    }

    #[tokio::test]
    async fn test_empty_root_writes_empty_listing() {
        let dir = tempfile::tempdir().unwrap();
        update_archive(dir.path(), as_of(), 14).await.unwrap();
        let html = std::fs::read_to_string(dir.path().join("archive.html")).unwrap();
        assert!(html.contains("<ul class=\"runs\">"));
        assert!(!html.contains("li class=\"run\""));
    }
}
