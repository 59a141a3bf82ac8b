//! Pipeline orchestrator: one run, start to finish.
//!
//! Sequences history → per-topic acquisition → pool assembly → selection →
//! grouping → global-id assignment → expansion, threading everything
//! through an explicit [`PipelineContext`], with no process-wide state. The
//! stages run strictly one after another; every oracle call in the run
//! happens on this one task.
//!
//! Only two conditions abort a run (and leave no artifacts): an empty
//! selection pool and an empty final set. Everything else (exhausted
//! topics, short selections, failed groupings, failed expansions) degrades
//! to "something, possibly incomplete" with a warning.

use crate::acquisition::{TopicOutcome, acquire_topic};
use crate::config::RunConfig;
use crate::expand::expand_stories;
use crate::grouping::group_stories;
use crate::history::load_history;
use crate::models::{Briefing, PooledStory, Story, number_groups};
use crate::oracle::Oracle;
use crate::selection::select_stories;
use chrono::NaiveDateTime;
use itertools::Itertools;
use std::path::Path;
use tracing::{info, instrument, warn};

/// The two conditions that end a run with nothing written.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no valid stories were generated for any topic")]
    PoolExhausted,
    #[error("selection produced an empty story set")]
    SelectionEmpty,
}

/// One topic's accumulated candidates and how acquisition ended for it.
#[derive(Debug)]
pub struct TopicBucket {
    pub topic: String,
    pub stories: Vec<Story>,
    pub outcome: TopicOutcome,
}

/// Mutable state threaded through one run.
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub history: String,
    pub buckets: Vec<TopicBucket>,
    pub pool: Vec<PooledStory>,
}

impl PipelineContext {
    /// Flatten the buckets into the indexed selection pool, in topic
    /// declaration order. Indices are stable for the rest of the run.
    fn assemble_pool(&mut self) {
        self.pool.clear();
        for bucket in &self.buckets {
            for story in &bucket.stories {
                self.pool.push(PooledStory {
                    global_index: self.pool.len(),
                    topic: bucket.topic.clone(),
                    story: story.clone(),
                });
            }
        }
    }
}

/// Execute one full run and return the finished briefing.
///
/// `now` is the run timestamp (drives the recency window, the history
/// lookback, and the briefing date). Rendering and archive maintenance are
/// the caller's job; this function only produces the data.
#[instrument(level = "info", skip_all, fields(%now, live_search))]
pub async fn run<O: Oracle>(
    oracle: &O,
    config: &RunConfig,
    output_root: &Path,
    now: NaiveDateTime,
    live_search: bool,
) -> Result<Briefing, PipelineError> {
    let today = now.date();
    let mut ctx = PipelineContext {
        history: load_history(output_root, today, config.lookback_days).await,
        ..Default::default()
    };

    for topic in &config.topics {
        let (stories, outcome) =
            acquire_topic(oracle, topic, config, &ctx.history, today, live_search).await;
        info!(
            topic = %topic.name,
            collected = stories.len(),
            satisfied = matches!(outcome, TopicOutcome::Satisfied),
            "Topic acquisition finished"
        );
        ctx.buckets.push(TopicBucket {
            topic: topic.name.clone(),
            stories,
            outcome,
        });
    }

    ctx.assemble_pool();
    let satisfied_topics = ctx
        .buckets
        .iter()
        .filter(|b| matches!(b.outcome, TopicOutcome::Satisfied))
        .count();
    info!(
        pool = ctx.pool.len(),
        topics = ctx.buckets.len(),
        satisfied_topics,
        "Selection pool assembled"
    );
    if ctx.pool.is_empty() {
        return Err(PipelineError::PoolExhausted);
    }

    let selected = select_stories(
        oracle,
        &ctx.pool,
        &config.topics,
        &ctx.history,
        config.target_total,
    )
    .await;

    // The only hard uniqueness guarantee: no two finalized stories may
    // share a (title, summary) identity, even across topic buckets.
    let final_set: Vec<Story> = selected
        .into_iter()
        .map(|p| p.story)
        .unique_by(Story::identity_key)
        .collect();

    if final_set.is_empty() {
        return Err(PipelineError::SelectionEmpty);
    }
    if final_set.len() < config.target_total {
        warn!(
            selected = final_set.len(),
            target = config.target_total,
            "Final story set is short of target; proceeding"
        );
    } else {
        info!(selected = final_set.len(), "Final story set complete");
    }

    let groups = group_stories(oracle, &final_set).await;
    let mut numbered = number_groups(groups);
    expand_stories(oracle, &mut numbered, config, today).await;

    let briefing = Briefing {
        local_date: today.to_string(),
        generated_at: now.format("%Y-%m-%d %H:%M").to_string(),
        groups: numbered,
    };
    info!(
        stories = briefing.story_count(),
        groups = briefing.groups.len(),
        "Run finished"
    );
    Ok(briefing)
}
