//! Per-story expansion: turn each finalized story into article prose.
//!
//! Strictly sequential, one oracle call per story with a fixed delay in
//! between; the delay is the rate-limit admission control for the longest
//! stage of the run. A failed expansion is retried once; after that the
//! story page simply falls back to its summary. Expansion failures never
//! remove a story from the briefing.

use crate::config::RunConfig;
use crate::models::PublishedGroup;
use crate::oracle::{GenerateOptions, Oracle};
use chrono::NaiveDate;
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Expand every story in the numbered groups, in global-id order.
#[instrument(level = "info", skip_all)]
pub async fn expand_stories<O: Oracle>(
    oracle: &O,
    groups: &mut [PublishedGroup],
    config: &RunConfig,
    today: NaiveDate,
) {
    let total: usize = groups.iter().map(|g| g.stories.len()).sum();
    let mut expanded = 0usize;
    let mut first = true;

    for group in groups.iter_mut() {
        for published in group.stories.iter_mut() {
            if !first {
                let jitter_ms: u64 = rng().random_range(0..=250);
                sleep(
                    std::time::Duration::from_secs(config.expand_delay_secs)
                        + std::time::Duration::from_millis(jitter_ms),
                )
                .await;
            }
            first = false;

            let prompt = build_expansion_prompt(
                &group.name,
                &published.story.title,
                &published.story.summary,
                &published.story.source,
                today,
            );
            let opts = GenerateOptions::text(1200);
            let mut result = oracle.generate(&prompt, &opts).await;
            if result.is_err() {
                warn!(
                    global_id = published.global_id,
                    "Expansion failed; re-asking once"
                );
                result = oracle.generate(&prompt, &opts).await;
            }
            match result {
                Ok(text) if !text.trim().is_empty() => {
                    published.article = Some(text.trim().to_string());
                    expanded += 1;
                }
                Ok(_) => {
                    warn!(
                        global_id = published.global_id,
                        "Expansion returned empty text; page will use the summary"
                    );
                }
                Err(e) => {
                    warn!(
                        global_id = published.global_id,
                        error = %e,
                        "Expansion failed twice; page will use the summary"
                    );
                }
            }
        }
    }
    info!(expanded, total, "Story expansion finished");
}

fn build_expansion_prompt(
    group: &str,
    title: &str,
    summary: &str,
    source: &str,
    today: NaiveDate,
) -> String {
    format!(
        "Write a factual 3 to 5 paragraph news article for a sharp 12 year old UK gamer, \
         dated {date}, expanding this story from the \"{group}\" section.\n\
         Title: {title}\nTeaser: {summary}\nSource basis: {source}\n\
         Stick strictly to what the source basis supports; no speculation, no invented \
         quotes. Direct language, end with a sharp insight. Output plain prose paragraphs \
         separated by blank lines, no headings and no JSON.",
        date = today.format("%-d %B %Y"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PublishedStory, Story, StoryGroup, number_groups};
    use crate::oracle::testing::ScriptedOracle;

    fn groups(n: usize) -> Vec<PublishedGroup> {
        let stories = (0..n)
            .map(|i| Story {
                title: format!("title {i}"),
                summary: format!("summary {i}"),
                source: "BBC: report".to_string(),
            })
            .collect();
        number_groups(vec![StoryGroup {
            name: "Gaming".to_string(),
            stories,
        }])
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 17).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_expansion_fills_articles_in_order() {
        let mut published = groups(3);
        let oracle = ScriptedOracle::new(vec![
            Ok("article one".to_string()),
            Ok("article two".to_string()),
            Ok("article three".to_string()),
        ]);
        expand_stories(&oracle, &mut published, &RunConfig::default(), today()).await;
        let articles: Vec<Option<String>> = published[0]
            .stories
            .iter()
            .map(|s| s.article.clone())
            .collect();
        assert_eq!(
            articles,
            vec![
                Some("article one".to_string()),
                Some("article two".to_string()),
                Some("article three".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_expansion_retries_once_then_moves_on() {
        let mut published = groups(2);
        let oracle = ScriptedOracle::new(vec![
            Err(ScriptedOracle::unavailable()),
            Err(ScriptedOracle::unavailable()),
            Ok("second story article".to_string()),
        ]);
        expand_stories(&oracle, &mut published, &RunConfig::default(), today()).await;
        assert_eq!(oracle.calls(), 3);
        assert!(published[0].stories[0].article.is_none());
        assert_eq!(
            published[0].stories[1].article.as_deref(),
            Some("second story article")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_article_treated_as_missing() {
        let mut published = groups(1);
        let oracle = ScriptedOracle::new(vec![Ok("   \n".to_string())]);
        expand_stories(&oracle, &mut published, &RunConfig::default(), today()).await;
        assert!(published[0].stories[0].article.is_none());
    }

    #[test]
    fn test_expansion_prompt_carries_story_fields() {
        let prompt =
            build_expansion_prompt("Gaming", "Patch lands", "Big changes.", "BBC: notes", today());
        assert!(prompt.contains("Patch lands"));
        assert!(prompt.contains("Big changes."));
        assert!(prompt.contains("BBC: notes"));
        assert!(prompt.contains("Gaming"));
        assert!(prompt.contains("17 October 2025"));
    }

    #[test]
    fn test_published_story_starts_unexpanded() {
        let g = groups(1);
        let PublishedStory { article, .. } = &g[0].stories[0];
        assert!(article.is_none());
    }
}
