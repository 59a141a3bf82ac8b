//! Data models for the story pipeline.
//!
//! This module defines the core data structures threaded through the run:
//! - [`Story`]: a validated candidate news item
//! - [`Topic`]: a configured category with a final-selection target
//! - [`PooledStory`]: a story tagged with its topic and selection-pool index
//! - [`StoryGroup`] / [`PublishedGroup`]: thematic partitions before and
//!   after global-id assignment
//! - [`Briefing`]: the finished run output handed to rendering
//! - Wire payloads: the JSON shapes the oracle is asked to emit
//!
//! Wire payload fields use camelCase to match the JSON schema the oracle is
//! prompted with, hence the `#[serde(rename_all = "camelCase")]` attribute.

use serde::{Deserialize, Serialize};

/// A validated news story.
///
/// All three fields are trimmed and non-empty by the time a `Story` exists;
/// raw oracle records are screened by [`crate::validate::validate_stories`]
/// before this type is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Story {
    /// Headline text.
    pub title: String,
    /// One-sentence teaser.
    pub summary: String,
    /// Outlet and fact basis, e.g. `"BBC: Official announcement"`.
    pub source: String,
}

impl Story {
    /// Dedup identity: case-insensitive `(title, summary)` pair.
    ///
    /// Two stories are considered the same iff this key matches exactly.
    /// `source` is deliberately excluded; the same story reported by two
    /// outlets is still a repeat.
    pub fn identity_key(&self) -> String {
        format!(
            "{}||{}",
            self.title.to_lowercase(),
            self.summary.to_lowercase()
        )
    }
}

/// A configured news category.
///
/// Topics are fixed at pipeline start and immutable during a run. `target`
/// is the *final selection* quota; the per-topic generation quota
/// (`stories_per_topic`) lives in [`crate::config::RunConfig`] and is
/// independent of it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Topic {
    /// Short identifier, e.g. `"gaming"`.
    pub name: String,
    /// How many stories of this topic the final set should carry.
    pub target: usize,
    /// Free-text description fed into generation prompts.
    pub description: String,
}

/// A story in the selection pool, tagged with its origin.
#[derive(Debug, Clone)]
pub struct PooledStory {
    /// Stable 0-based index within the pool for the duration of selection.
    pub global_index: usize,
    /// Name of the topic whose bucket supplied this story.
    pub topic: String,
    pub story: Story,
}

/// A named thematic partition of the final story set, pre-numbering.
#[derive(Debug, Clone)]
pub struct StoryGroup {
    pub name: String,
    pub stories: Vec<Story>,
}

/// A story with its permanent global id and optional expanded article body.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedStory {
    /// 1-based id, stable ordering = group order then within-group order.
    pub global_id: usize,
    pub story: Story,
    /// Expanded article prose; `None` when expansion failed or was skipped,
    /// in which case rendering falls back to the summary.
    pub article: Option<String>,
}

/// A [`StoryGroup`] after global-id assignment.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedGroup {
    pub name: String,
    pub stories: Vec<PublishedStory>,
}

/// The finished output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Briefing {
    /// Date of publication in `YYYY-MM-DD` format.
    pub local_date: String,
    /// Full run timestamp, human-readable.
    pub generated_at: String,
    pub groups: Vec<PublishedGroup>,
}

impl Briefing {
    /// Total story count across all groups.
    pub fn story_count(&self) -> usize {
        self.groups.iter().map(|g| g.stories.len()).sum()
    }
}

/// Assign global ids 1..N across groups, in group order then in-group order.
pub fn number_groups(groups: Vec<StoryGroup>) -> Vec<PublishedGroup> {
    let mut next_id = 1usize;
    groups
        .into_iter()
        .map(|g| PublishedGroup {
            name: g.name,
            stories: g
                .stories
                .into_iter()
                .map(|story| {
                    let id = next_id;
                    next_id += 1;
                    PublishedStory {
                        global_id: id,
                        story,
                        article: None,
                    }
                })
                .collect(),
        })
        .collect()
}

// ---- Oracle wire payloads ----

/// Acquisition response: `{"stories": [{...}]}`.
///
/// Entries stay as raw `Value`s here; the validator decides which of them
/// become [`Story`] records.
#[derive(Debug, Deserialize)]
pub struct StoriesPayload {
    #[serde(default)]
    pub stories: Vec<serde_json::Value>,
}

/// Selection response: `{"selectedIndices": [0, 5, 12]}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    #[serde(default)]
    pub selected_indices: Vec<i64>,
}

/// Grouping response: `{"groups": [{"name": "...", "indices": [0, 1]}]}`.
#[derive(Debug, Deserialize)]
pub struct GroupsPayload {
    #[serde(default)]
    pub groups: Vec<GroupPayload>,
}

#[derive(Debug, Deserialize)]
pub struct GroupPayload {
    pub name: String,
    #[serde(default)]
    pub indices: Vec<i64>,
}
