//! Screening of raw oracle records: structural validation and dedup.
//!
//! Everything the oracle returns is untrusted free text that happened to
//! parse as JSON. No [`Story`] exists until a raw record has passed through
//! [`validate_stories`]; nothing enters a topic bucket until it has passed
//! [`dedupe_stories`]. Both are pure, order-preserving, and never fail for
//! a single bad record: a malformed entry is a filtering decision, not an
//! error.

use crate::config::StrictnessPolicy;
use crate::models::Story;
use crate::utils::word_count;
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Screen raw records into well-formed stories.
///
/// A record is dropped (with a warning) when it is not a JSON object or
/// when any of `title`/`summary`/`source` is missing or empty after
/// trimming. Surviving fields are stored trimmed. The optional strictness
/// checks (summary word bound, `:` separator in source) come from the
/// configured [`StrictnessPolicy`].
pub fn validate_stories(raw: &[Value], policy: &StrictnessPolicy) -> Vec<Story> {
    raw.iter()
        .filter_map(|record| {
            let Some(obj) = record.as_object() else {
                warn!(record = %crate::utils::truncate_for_log(&record.to_string(), 120), "Dropping non-object story record");
                return None;
            };
            let field = |name: &str| {
                obj.get(name)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            let (Some(title), Some(summary), Some(source)) =
                (field("title"), field("summary"), field("source"))
            else {
                warn!("Dropping story record with missing or empty fields");
                return None;
            };
            if policy.require_source_separator && !source.contains(':') {
                warn!(%source, "Dropping story with weak source format");
                return None;
            }
            if let Some(max_words) = policy.max_summary_words {
                if word_count(&summary) >= max_words {
                    warn!(%title, "Dropping story with over-long summary");
                    return None;
                }
            }
            Some(Story {
                title,
                summary,
                source,
            })
        })
        .collect()
}

/// The subset of `incoming` whose identity is not already in `existing`.
///
/// Identity is the case-insensitive `(title, summary)` pair
/// ([`Story::identity_key`]). Order of `incoming` is preserved, and repeats
/// *within* `incoming` are collapsed too, so appending the result to
/// `existing` can never introduce a duplicate.
pub fn dedupe_stories(existing: &[Story], incoming: Vec<Story>) -> Vec<Story> {
    let seen: HashSet<String> = existing.iter().map(Story::identity_key).collect();
    let unique: Vec<Story> = incoming
        .into_iter()
        .unique_by(Story::identity_key)
        .filter(|s| !seen.contains(&s.identity_key()))
        .collect();
    debug!(kept = unique.len(), "Deduplicated incoming stories");
    unique
}
