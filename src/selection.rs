//! Selection Engine: balance an oversupplied pool against per-topic targets.
//!
//! Primary path: the whole pool (condensed) goes to the oracle with the
//! target table and the history digest, and the oracle answers with pool
//! indices. Indices that do not resolve are dropped silently; the result is
//! capped at the configured total.
//!
//! Fallback path: deterministic, no oracle. Take up to each topic's target
//! from its bucket in topic declaration order, then pad with unused pool
//! entries. Used on oracle failure, malformed response, or an answer that
//! resolves to nothing; if the pool is non-empty, selection always
//! produces something.

use crate::models::{PooledStory, SelectionPayload, Topic};
use crate::oracle::{GenerateOptions, Oracle};
use crate::utils::{truncate_chars, truncate_for_log};
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

/// Select the final story set from the pool.
///
/// Returns at most `target_total` stories, best-effort exactly that many.
/// The pool must be non-empty; the orchestrator aborts before calling this
/// otherwise.
#[instrument(level = "info", skip_all, fields(pool = pool.len(), target_total))]
pub async fn select_stories<O: Oracle>(
    oracle: &O,
    pool: &[PooledStory],
    topics: &[Topic],
    history: &str,
    target_total: usize,
) -> Vec<PooledStory> {
    let prompt = build_selection_prompt(pool, topics, history, target_total);
    match oracle.generate(&prompt, &GenerateOptions::json(1500)).await {
        Ok(text) => match serde_json::from_str::<SelectionPayload>(&text) {
            Ok(payload) => {
                let selected = resolve_indices(pool, &payload.selected_indices, target_total);
                if selected.is_empty() {
                    warn!("Oracle selection resolved to nothing; using fallback");
                    fallback_selection(pool, topics, target_total)
                } else {
                    info!(
                        selected = selected.len(),
                        proposed = payload.selected_indices.len(),
                        "Oracle selection accepted"
                    );
                    selected
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&text, 200),
                    "Selection response did not parse; using fallback"
                );
                fallback_selection(pool, topics, target_total)
            }
        },
        Err(e) => {
            warn!(error = %e, "Selection oracle call failed; using fallback");
            fallback_selection(pool, topics, target_total)
        }
    }
}

/// Map proposed indices back to pool entries.
///
/// Out-of-range indices and repeats are dropped, not fatal; order follows
/// the proposal. Result is capped at `target_total`.
fn resolve_indices(pool: &[PooledStory], indices: &[i64], target_total: usize) -> Vec<PooledStory> {
    let mut seen: HashSet<usize> = HashSet::new();
    indices
        .iter()
        .filter_map(|&idx| usize::try_from(idx).ok())
        .filter(|&idx| idx < pool.len() && seen.insert(idx))
        .map(|idx| pool[idx].clone())
        .take(target_total)
        .collect()
}

/// Deterministic selection: per-topic targets in declaration order, then
/// pad from whatever pool entries are left.
fn fallback_selection(
    pool: &[PooledStory],
    topics: &[Topic],
    target_total: usize,
) -> Vec<PooledStory> {
    let mut selected: Vec<PooledStory> = Vec::new();
    let mut used: HashSet<usize> = HashSet::new();

    for topic in topics {
        let take = pool
            .iter()
            .filter(|p| p.topic == topic.name)
            .take(topic.target);
        for entry in take {
            if selected.len() >= target_total {
                break;
            }
            if used.insert(entry.global_index) {
                selected.push(entry.clone());
            }
        }
    }

    for entry in pool {
        if selected.len() >= target_total {
            break;
        }
        if used.insert(entry.global_index) {
            selected.push(entry.clone());
        }
    }

    info!(selected = selected.len(), "Fallback selection assembled");
    selected
}

fn build_selection_prompt(
    pool: &[PooledStory],
    topics: &[Topic],
    history: &str,
    target_total: usize,
) -> String {
    let condensed: Vec<serde_json::Value> = pool
        .iter()
        .map(|p| {
            json!({
                "index": p.global_index,
                "topic": p.topic,
                "title": truncate_chars(&p.story.title, 60),
                "summary": truncate_chars(&p.story.summary, 40),
            })
        })
        .collect();
    let target_summary = topics
        .iter()
        .map(|t| format!("{}: {}", t.name, t.target))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are curating a balanced news feed for a UK gamer. Select stories to meet these \
         targets ({target_summary}; total exactly {target_total}).\n\
         From the provided stories, select up to the target number from each topic (prioritize \
         diverse, high-impact, fresh ones across all). If fewer are available for a topic, take \
         all of them. To reach exactly {target_total}, add extras from the topic with the most \
         available after base targets. Ensure no duplicates.\n\
         Input stories: {}.\n\
         Output strict JSON only: {{\"selectedIndices\": [0, 5, 12]}} (global indices, numbers).",
        serde_json::to_string(&condensed).unwrap_or_default(),
    );
    if !history.is_empty() {
        prompt.push_str("\nStories covered in recent days (prefer fresh angles over these):\n");
        prompt.push_str(history);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Story;
    use crate::oracle::testing::ScriptedOracle;

    fn pool_entry(global_index: usize, topic: &str) -> PooledStory {
        PooledStory {
            global_index,
            topic: topic.to_string(),
            story: Story {
                title: format!("{topic} title {global_index}"),
                summary: format!("{topic} summary {global_index}"),
                source: "BBC: report".to_string(),
            },
        }
    }

    fn topic(name: &str, target: usize) -> Topic {
        Topic {
            name: name.to_string(),
            target,
            description: String::new(),
        }
    }

    /// `counts` = stories per topic, in order; indices are assigned pool-wide.
    fn make_pool(counts: &[(&str, usize)]) -> Vec<PooledStory> {
        let mut pool = Vec::new();
        let mut idx = 0;
        for &(name, count) in counts {
            for _ in 0..count {
                pool.push(pool_entry(idx, name));
                idx += 1;
            }
        }
        pool
    }

    #[tokio::test]
    async fn test_oracle_selection_resolves_and_caps() {
        let pool = make_pool(&[("gaming", 10), ("world", 15)]);
        let indices: Vec<i64> = (0..25).collect();
        let oracle = ScriptedOracle::new(vec![Ok(
            json!({"selectedIndices": indices}).to_string()
        )]);
        let topics = vec![topic("gaming", 10), topic("world", 10)];
        let selected = select_stories(&oracle, &pool, &topics, "", 20).await;
        assert_eq!(selected.len(), 20);
    }

    #[tokio::test]
    async fn test_bad_indices_dropped_silently() {
        let pool = make_pool(&[("gaming", 4)]);
        let oracle = ScriptedOracle::new(vec![Ok(
            json!({"selectedIndices": [0, 99, -3, 2, 2]}).to_string()
        )]);
        let topics = vec![topic("gaming", 3)];
        let selected = select_stories(&oracle, &pool, &topics, "", 20).await;
        let indices: Vec<usize> = selected.iter().map(|s| s.global_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    // Short pool, failing oracle: fallback returns the whole pool with no
    // duplicates when supply is under the total.
    #[tokio::test]
    async fn test_fallback_with_short_supply_takes_everything() {
        let pool = make_pool(&[("gaming", 4), ("hardware", 4), ("world", 4), ("ukgov", 3)]);
        assert_eq!(pool.len(), 15);
        let oracle = ScriptedOracle::failing();
        let topics = vec![
            topic("gaming", 4),
            topic("hardware", 5),
            topic("world", 5),
            topic("ukgov", 3),
        ];
        let selected = select_stories(&oracle, &pool, &topics, "", 20).await;
        assert_eq!(selected.len(), 15);
        let unique: HashSet<usize> = selected.iter().map(|s| s.global_index).collect();
        assert_eq!(unique.len(), 15);
    }

    #[tokio::test]
    async fn test_fallback_honors_targets_then_pads() {
        let pool = make_pool(&[("gaming", 8), ("world", 8)]);
        let oracle = ScriptedOracle::failing();
        let topics = vec![topic("gaming", 2), topic("world", 3)];
        let selected = select_stories(&oracle, &pool, &topics, "", 10).await;
        assert_eq!(selected.len(), 10);
        // targets honored first, in declaration order
        assert_eq!(selected[0].topic, "gaming");
        assert_eq!(selected[1].topic, "gaming");
        assert_eq!(selected[2].topic, "world");
        assert_eq!(selected[4].topic, "world");
        let unique: HashSet<usize> = selected.iter().map(|s| s.global_index).collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn test_malformed_selection_response_falls_back() {
        let pool = make_pool(&[("gaming", 5)]);
        let oracle = ScriptedOracle::new(vec![Ok("no json here".to_string())]);
        let topics = vec![topic("gaming", 3)];
        let selected = select_stories(&oracle, &pool, &topics, "", 20).await;
        assert_eq!(selected.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_resolution_falls_back() {
        let pool = make_pool(&[("gaming", 5)]);
        let oracle = ScriptedOracle::new(vec![Ok(
            json!({"selectedIndices": [99, 100]}).to_string()
        )]);
        let topics = vec![topic("gaming", 3)];
        let selected = select_stories(&oracle, &pool, &topics, "", 20).await;
        assert_eq!(selected.len(), 5);
    }

    #[test]
    fn test_prompt_condenses_long_fields() {
        let mut pool = make_pool(&[("gaming", 1)]);
        pool[0].story.title = "t".repeat(200);
        pool[0].story.summary = "s".repeat(200);
        let prompt = build_selection_prompt(&pool, &[topic("gaming", 3)], "", 20);
        assert!(!prompt.contains(&"t".repeat(61)));
        assert!(!prompt.contains(&"s".repeat(41)));
        assert!(prompt.contains("gaming: 3"));
    }
}
