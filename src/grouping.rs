//! Grouping Engine: partition the final story set into named sections.
//!
//! Three tiers, each strictly validated before acceptance:
//!
//! 1. Primary: ask the oracle for 3–6 named groups of story indices
//!    covering every index exactly once.
//! 2. Retry: simplified prompt that pins the group count to
//!    `clamp(ceil(N/4), 3, 6)` and suggests category names.
//! 3. Fallback split: deterministic contiguous near-even slices with names
//!    from a fixed pool. No oracle involved; cannot fail.
//!
//! The oracle's categorization is best-effort enrichment. Correctness of
//! the partition (every story in exactly one group, nothing dropped,
//! nothing duplicated) must never depend on it, which is what the
//! validation plus the guaranteed fallback buy.

use crate::models::{GroupsPayload, Story, StoryGroup};
use crate::oracle::{GenerateOptions, Oracle};
use crate::utils::{truncate_chars, truncate_for_log};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, instrument, warn};

static FALLBACK_GROUP_NAMES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Gaming",
        "Hardware & Tech",
        "World News",
        "UK & Politics",
        "Science",
        "More Stories",
    ]
});

/// Partition `stories` into 3–6 named groups.
///
/// Always succeeds; the worst case is the deterministic split. The
/// returned groups cover every input story exactly once, in some order.
#[instrument(level = "info", skip_all, fields(stories = stories.len()))]
pub async fn group_stories<O: Oracle>(oracle: &O, stories: &[Story]) -> Vec<StoryGroup> {
    let n = stories.len();
    if n < 3 {
        // Too few for a meaningful thematic split; one slice per story.
        return fallback_split(stories);
    }

    match attempt(oracle, stories, &primary_prompt(stories)).await {
        Some(groups) => {
            info!(groups = groups.len(), "Primary grouping accepted");
            groups
        }
        None => match attempt(oracle, stories, &retry_prompt(stories)).await {
            Some(groups) => {
                info!(groups = groups.len(), "Retry grouping accepted");
                groups
            }
            None => {
                warn!("Both grouping attempts rejected; using deterministic split");
                fallback_split(stories)
            }
        },
    }
}

/// One oracle round: call, parse, validate. `None` on any failure.
async fn attempt<O: Oracle>(oracle: &O, stories: &[Story], prompt: &str) -> Option<Vec<StoryGroup>> {
    let text = match oracle.generate(prompt, &GenerateOptions::json(1500)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Grouping oracle call failed");
            return None;
        }
    };
    let payload = match serde_json::from_str::<GroupsPayload>(&text) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&text, 200),
                "Grouping response did not parse"
            );
            return None;
        }
    };
    validate_groups(&payload, stories)
}

/// Check the proposed partition and materialize it.
///
/// Rejects when the group count is outside [3,6] or the union of indices
/// is not a permutation of `0..N` (out of range, repeated, or missing).
fn validate_groups(payload: &GroupsPayload, stories: &[Story]) -> Option<Vec<StoryGroup>> {
    let n = stories.len();
    if !(3..=6).contains(&payload.groups.len()) {
        warn!(groups = payload.groups.len(), "Group count out of range");
        return None;
    }
    let mut seen: HashSet<usize> = HashSet::new();
    let mut total = 0usize;
    for group in &payload.groups {
        for &idx in &group.indices {
            let Ok(idx) = usize::try_from(idx) else {
                warn!(idx, "Negative story index in grouping");
                return None;
            };
            if idx >= n || !seen.insert(idx) {
                warn!(idx, "Out-of-range or repeated story index in grouping");
                return None;
            }
            total += 1;
        }
    }
    if total != n {
        warn!(covered = total, expected = n, "Grouping does not cover all stories");
        return None;
    }
    Some(
        payload
            .groups
            .iter()
            .map(|g| StoryGroup {
                name: g.name.trim().to_string(),
                stories: g
                    .indices
                    .iter()
                    .map(|&idx| stories[idx as usize].clone())
                    .collect(),
            })
            .collect(),
    )
}

/// Deterministic split: contiguous, nearly equal slices in original order.
pub fn fallback_split(stories: &[Story]) -> Vec<StoryGroup> {
    let n = stories.len();
    if n == 0 {
        return Vec::new();
    }
    let num_groups = pinned_group_count(n);
    let base = n / num_groups;
    let remainder = n % num_groups;

    let mut groups = Vec::with_capacity(num_groups);
    let mut cursor = 0usize;
    for k in 0..num_groups {
        let len = base + usize::from(k < remainder);
        let name = FALLBACK_GROUP_NAMES
            .get(k)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("Group {}", k + 1));
        groups.push(StoryGroup {
            name,
            stories: stories[cursor..cursor + len].to_vec(),
        });
        cursor += len;
    }
    groups
}

/// `clamp(ceil(N/4), 3, 6)`, additionally capped at N so no group is empty.
fn pinned_group_count(n: usize) -> usize {
    n.div_ceil(4).clamp(3, 6).min(n.max(1))
}

fn condensed(stories: &[Story]) -> String {
    let entries: Vec<serde_json::Value> = stories
        .iter()
        .enumerate()
        .map(|(i, s)| {
            json!({
                "index": i,
                "title": truncate_chars(&s.title, 60),
                "summary": truncate_chars(&s.summary, 40),
            })
        })
        .collect();
    serde_json::to_string(&entries).unwrap_or_default()
}

fn primary_prompt(stories: &[Story]) -> String {
    format!(
        "Partition these {n} news stories into 3 to 6 thematic groups for a daily briefing \
         aimed at a UK gamer. Give each group a short punchy name. Every story index from 0 \
         to {last} must appear in exactly one group; no repeats, no omissions.\n\
         Input stories: {input}.\n\
         Output strict JSON only: {{\"groups\": [{{\"name\": \"...\", \"indices\": [0, 1]}}]}}.",
        n = stories.len(),
        last = stories.len() - 1,
        input = condensed(stories),
    )
}

fn retry_prompt(stories: &[Story]) -> String {
    let num_groups = pinned_group_count(stories.len());
    format!(
        "Split these {n} news stories into exactly {num_groups} groups. Suggested names: \
         {names}. Every index from 0 to {last} must appear in exactly one group; no repeats, \
         no omissions.\n\
         Input stories: {input}.\n\
         Output strict JSON only: {{\"groups\": [{{\"name\": \"...\", \"indices\": [0, 1]}}]}}.",
        n = stories.len(),
        names = FALLBACK_GROUP_NAMES.join(", "),
        last = stories.len() - 1,
        input = condensed(stories),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::ScriptedOracle;

    fn stories(n: usize) -> Vec<Story> {
        (0..n)
            .map(|i| Story {
                title: format!("title {i}"),
                summary: format!("summary {i}"),
                source: "BBC: report".to_string(),
            })
            .collect()
    }

    fn assert_partition(groups: &[StoryGroup], original: &[Story]) {
        let total: usize = groups.iter().map(|g| g.stories.len()).sum();
        assert_eq!(total, original.len());
        let keys: HashSet<String> = groups
            .iter()
            .flat_map(|g| g.stories.iter().map(Story::identity_key))
            .collect();
        assert_eq!(keys.len(), original.len());
    }

    #[tokio::test]
    async fn test_primary_accepted_when_valid() {
        let input = stories(8);
        let response = json!({"groups": [
            {"name": "A", "indices": [0, 1, 2]},
            {"name": "B", "indices": [3, 4, 5]},
            {"name": "C", "indices": [6, 7]},
        ]})
        .to_string();
        let oracle = ScriptedOracle::new(vec![Ok(response)]);
        let groups = group_stories(&oracle, &input).await;
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name, "A");
        assert_eq!(groups[2].stories[0].title, "title 6");
        assert_partition(&groups, &input);
        assert_eq!(oracle.calls(), 1);
    }

    // Primary covers only 18 of 20 indices, retry errors: the fallback
    // split produces 5 groups of 4 covering all 20.
    #[tokio::test]
    async fn test_incomplete_cover_falls_through_to_split() {
        let input = stories(20);
        let partial = json!({"groups": [
            {"name": "A", "indices": (0..9).collect::<Vec<i64>>()},
            {"name": "B", "indices": (9..18).collect::<Vec<i64>>()},
            {"name": "C", "indices": Vec::<i64>::new()},
        ]})
        .to_string();
        let oracle = ScriptedOracle::new(vec![Ok(partial)]); // retry call then fails
        let groups = group_stories(&oracle, &input).await;
        assert_eq!(oracle.calls(), 2);
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|g| g.stories.len() == 4));
        assert_partition(&groups, &input);
    }

    #[tokio::test]
    async fn test_repeated_index_rejected() {
        let input = stories(6);
        let bad = json!({"groups": [
            {"name": "A", "indices": [0, 1]},
            {"name": "B", "indices": [1, 2, 3]},
            {"name": "C", "indices": [4, 5]},
        ]})
        .to_string();
        let oracle = ScriptedOracle::new(vec![Ok(bad)]);
        let groups = group_stories(&oracle, &input).await;
        assert_partition(&groups, &input);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_group_count_out_of_range_rejected() {
        let input = stories(6);
        let two_groups = json!({"groups": [
            {"name": "A", "indices": [0, 1, 2]},
            {"name": "B", "indices": [3, 4, 5]},
        ]})
        .to_string();
        let oracle = ScriptedOracle::new(vec![Ok(two_groups)]);
        let groups = group_stories(&oracle, &input).await;
        assert!((3..=6).contains(&groups.len()));
        assert_partition(&groups, &input);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_primary_failure() {
        let input = stories(8);
        let good = json!({"groups": [
            {"name": "Gaming", "indices": [0, 1, 2]},
            {"name": "World", "indices": [3, 4, 5]},
            {"name": "Science", "indices": [6, 7]},
        ]})
        .to_string();
        let oracle = ScriptedOracle::new(vec![Ok("garbage".to_string()), Ok(good)]);
        let groups = group_stories(&oracle, &input).await;
        assert_eq!(oracle.calls(), 2);
        assert_eq!(groups[0].name, "Gaming");
        assert_partition(&groups, &input);
    }

    // Partition holds for every size when forced through the fallback.
    #[tokio::test]
    async fn test_forced_fallback_partitions_all_sizes() {
        for n in 3..=30 {
            let input = stories(n);
            let oracle = ScriptedOracle::failing();
            let groups = group_stories(&oracle, &input).await;
            assert!(
                (3..=6).contains(&groups.len()),
                "n={n} gave {} groups",
                groups.len()
            );
            assert!(groups.iter().all(|g| !g.stories.is_empty()), "n={n}");
            assert_partition(&groups, &input);
        }
    }

    #[tokio::test]
    async fn test_tiny_sets_skip_the_oracle() {
        let input = stories(2);
        let oracle = ScriptedOracle::failing();
        let groups = group_stories(&oracle, &input).await;
        assert_eq!(oracle.calls(), 0);
        assert_eq!(groups.len(), 2);
        assert_partition(&groups, &input);
    }

    #[test]
    fn test_pinned_group_count() {
        assert_eq!(pinned_group_count(3), 3);
        assert_eq!(pinned_group_count(12), 3);
        assert_eq!(pinned_group_count(20), 5);
        assert_eq!(pinned_group_count(24), 6);
        assert_eq!(pinned_group_count(100), 6);
    }

    #[test]
    fn test_fallback_split_near_even() {
        let input = stories(22);
        let groups = fallback_split(&input);
        assert_eq!(groups.len(), 6);
        let sizes: Vec<usize> = groups.iter().map(|g| g.stories.len()).collect();
        assert_eq!(sizes, vec![4, 4, 4, 4, 3, 3]);
        // original order preserved across the slices
        assert_eq!(groups[0].stories[0].title, "title 0");
        assert_eq!(groups[5].stories[2].title, "title 21");
    }
}
