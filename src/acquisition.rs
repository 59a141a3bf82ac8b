//! Topic Acquisition Engine: fill one topic's bucket from the oracle.
//!
//! Per topic the engine runs a bounded request/validate/accumulate loop:
//! ask the oracle for a batch, screen it ([`crate::validate`]), append what
//! is new, and stop as soon as the generation quota is met or the try
//! budget is spent. An oracle failure inside the loop is logged and costs
//! one try; it never aborts the topic, and an exhausted topic never aborts
//! the run; it simply contributes fewer candidates.
//!
//! From the second try on, the prompt relaxes its required count (accept at
//! least half the quota) to improve yield from a reluctant oracle. Between
//! tries the engine sleeps a flat configured delay plus a little jitter;
//! the delay is rate-limit backpressure, not exponential backoff.

use crate::config::RunConfig;
use crate::models::{StoriesPayload, Story, Topic};
use crate::oracle::{GenerateOptions, Oracle, SearchWindow};
use crate::utils::truncate_for_log;
use crate::validate::{dedupe_stories, validate_stories};
use chrono::{Duration, NaiveDate};
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Terminal state of one topic's acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    /// Bucket reached the generation quota (and was truncated to it).
    Satisfied,
    /// Try budget spent with the bucket still short. A warning, not an error.
    Exhausted,
}

/// Acquire stories for one topic.
///
/// Returns the accumulated bucket (never longer than the quota) and the
/// terminal state. The bucket only ever grows across tries; duplicates
/// against what is already in it are dropped on arrival.
#[instrument(level = "info", skip_all, fields(topic = %topic.name))]
pub async fn acquire_topic<O: Oracle>(
    oracle: &O,
    topic: &Topic,
    config: &RunConfig,
    history: &str,
    today: NaiveDate,
    live_search: bool,
) -> (Vec<Story>, TopicOutcome) {
    let quota = config.stories_per_topic;
    let mut bucket: Vec<Story> = Vec::new();
    let mut tries = 0usize;

    while bucket.len() < quota && tries < config.max_tries {
        tries += 1;
        let prompt = build_topic_prompt(topic, quota, today, history, tries > 1);
        let mut opts = GenerateOptions::json(2500);
        if live_search {
            let window = SearchWindow {
                from: today - Duration::days(1),
                to: today,
            };
            opts = opts.with_search(window, 15);
        }

        match oracle.generate(&prompt, &opts).await {
            Ok(text) => match serde_json::from_str::<StoriesPayload>(&text) {
                Ok(payload) => {
                    let raw_count = payload.stories.len();
                    let valid = validate_stories(&payload.stories, &config.strictness);
                    let valid_count = valid.len();
                    let fresh = dedupe_stories(&bucket, valid);
                    info!(
                        try_number = tries,
                        raw = raw_count,
                        valid = valid_count,
                        unique_new = fresh.len(),
                        "Acquisition try finished"
                    );
                    bucket.extend(fresh);
                    if bucket.len() >= quota {
                        bucket.truncate(quota);
                        info!(total = bucket.len(), tries, "Topic satisfied");
                        return (bucket, TopicOutcome::Satisfied);
                    }
                }
                Err(e) => {
                    warn!(
                        try_number = tries,
                        error = %e,
                        response_preview = %truncate_for_log(&text, 200),
                        "Oracle returned non-conforming JSON; try wasted"
                    );
                }
            },
            Err(e) => {
                warn!(try_number = tries, error = %e, "Oracle call failed; continuing");
            }
        }

        if bucket.len() < quota && tries < config.max_tries {
            let jitter_ms: u64 = rng().random_range(0..=250);
            sleep(
                std::time::Duration::from_secs(config.retry_delay_secs)
                    + std::time::Duration::from_millis(jitter_ms),
            )
            .await;
        }
    }

    warn!(
        total = bucket.len(),
        quota, tries, "Topic exhausted below quota"
    );
    (bucket, TopicOutcome::Exhausted)
}

/// Build the generation prompt for one topic try.
///
/// The relaxed form (tries > 1) asks for "as close to N as possible" with a
/// floor of half the quota, instead of "exactly N".
fn build_topic_prompt(
    topic: &Topic,
    quota: usize,
    today: NaiveDate,
    history: &str,
    relaxed: bool,
) -> String {
    let today_display = today.format("%-d %B %Y");
    let count_clause = if relaxed {
        format!(
            "generate as close to {quota} as possible unique stories (aim for at least {}, expand search if needed)",
            quota.div_ceil(2)
        )
    } else {
        format!("generate exactly {quota} unique stories")
    };

    let mut prompt = format!(
        "You are a gaming, tech, and world news curator for a sharp 12 year old UK gamer. \
         Use live search to {count_clause} from news in the last 24 hours based strictly on \
         well-researched, factually accurate current events from the web as of {today_display} \
         on {description}. Do not invent, fabricate, or speculate; only use verified facts from real news.\n\
         Mix for relevance: link world/UK stuff to gaming/tech where it fits based on real connections. \
         Variety: no repeats, all fresh. For heavy topics, deliver the facts and ripple effects clean.\n\
         For each story, provide:\n\
         - \"title\": punchy headline, descriptive of the actual story, no source names in it.\n\
         - \"summary\": 1 sentence teaser (under 30 words).\n\
         - \"source\": real news source and brief fact basis (e.g., \"BBC: Official announcement\").\n\
         Output strict JSON only: {{\"stories\": [{{\"title\": \"...\", \"summary\": \"...\", \"source\": \"...\"}}]}}.",
        description = topic.description,
    );

    if !history.is_empty() {
        prompt.push_str(
            "\nStories covered in the last 14 days (do not repeat or closely rehash these):\n",
        );
        prompt.push_str(history);
    }
    prompt
}
