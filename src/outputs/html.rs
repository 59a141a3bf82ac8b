//! Static page rendering: one run directory with an index and story pages.
//!
//! Plain string substitution, no template engine. The index markup
//! (`section.group` / `li.story` / `strong.title` / `span.summary`) is the
//! extraction contract for [`crate::history`].

use crate::models::{Briefing, PublishedStory};
use crate::utils::slugify_title;
use html_escape::encode_text;
use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Filename for a story page: zero-padded global id plus title slug.
pub fn story_filename(global_id: usize, title: &str) -> String {
    let slug: String = slugify_title(title).chars().take(60).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{global_id:03}.html")
    } else {
        format!("{global_id:03}-{slug}.html")
    }
}

/// Render the run's index page.
pub fn render_index(briefing: &Briefing) -> String {
    let mut page = String::new();
    writeln!(page, "<!DOCTYPE html>").unwrap();
    writeln!(page, "<html lang=\"en\">").unwrap();
    writeln!(
        page,
        "<head><meta charset=\"utf-8\"><title>Daily Briefing {}</title></head>",
        encode_text(&briefing.local_date)
    )
    .unwrap();
    writeln!(page, "<body>").unwrap();
    writeln!(
        page,
        "<h1>Daily Briefing {}</h1>",
        encode_text(&briefing.local_date)
    )
    .unwrap();
    writeln!(
        page,
        "<p class=\"generated\">Generated {}</p>",
        encode_text(&briefing.generated_at)
    )
    .unwrap();

    for group in &briefing.groups {
        writeln!(page, "<section class=\"group\">").unwrap();
        writeln!(page, "<h2>{}</h2>", encode_text(&group.name)).unwrap();
        writeln!(page, "<ul>").unwrap();
        for published in &group.stories {
            let file = story_filename(published.global_id, &published.story.title);
            writeln!(
                page,
                "<li class=\"story\"><a href=\"./{file}\"><strong class=\"title\">{}</strong></a> \
                 <span class=\"summary\">{}</span> <em class=\"source\">{}</em></li>",
                encode_text(&published.story.title),
                encode_text(&published.story.summary),
                encode_text(&published.story.source),
            )
            .unwrap();
        }
        writeln!(page, "</ul>").unwrap();
        writeln!(page, "</section>").unwrap();
    }

    writeln!(page, "<p><a href=\"../archive.html\">Past briefings</a></p>").unwrap();
    writeln!(page, "</body>").unwrap();
    writeln!(page, "</html>").unwrap();
    page
}

/// Render one story page. Falls back to the summary when no expanded
/// article is available.
pub fn render_story_page(group_name: &str, published: &PublishedStory) -> String {
    let mut page = String::new();
    writeln!(page, "<!DOCTYPE html>").unwrap();
    writeln!(page, "<html lang=\"en\">").unwrap();
    writeln!(
        page,
        "<head><meta charset=\"utf-8\"><title>{}</title></head>",
        encode_text(&published.story.title)
    )
    .unwrap();
    writeln!(page, "<body>").unwrap();
    writeln!(page, "<p class=\"group-name\">{}</p>", encode_text(group_name)).unwrap();
    writeln!(page, "<h1>{}</h1>", encode_text(&published.story.title)).unwrap();

    writeln!(page, "<div class=\"article\">").unwrap();
    match &published.article {
        Some(article) => {
            for paragraph in article.split("\n\n").filter(|p| !p.trim().is_empty()) {
                writeln!(page, "<p>{}</p>", encode_text(paragraph.trim())).unwrap();
            }
        }
        None => {
            writeln!(page, "<p>{}</p>", encode_text(&published.story.summary)).unwrap();
        }
    }
    writeln!(page, "</div>").unwrap();

    writeln!(
        page,
        "<p class=\"source\">{}</p>",
        encode_text(&published.story.source)
    )
    .unwrap();
    writeln!(page, "<p><a href=\"./index.html\">Back to briefing</a></p>").unwrap();
    writeln!(page, "</body>").unwrap();
    writeln!(page, "</html>").unwrap();
    page
}

/// Write the full run directory: `index.html` plus one page per story.
///
/// Pages are rendered up front; nothing is written until the briefing is
/// fully resolved, so a crash mid-pipeline leaves no partial run directory.
#[instrument(level = "info", skip_all, fields(%run_dir_name))]
pub async fn write_run_dir(
    root: &Path,
    run_dir_name: &str,
    briefing: &Briefing,
) -> Result<PathBuf, Box<dyn Error>> {
    let run_dir = root.join(run_dir_name);
    fs::create_dir_all(&run_dir).await?;

    fs::write(run_dir.join("index.html"), render_index(briefing)).await?;
    for group in &briefing.groups {
        for published in &group.stories {
            let file = story_filename(published.global_id, &published.story.title);
            fs::write(
                run_dir.join(&file),
                render_story_page(&group.name, published),
            )
            .await?;
        }
    }

    info!(
        path = %run_dir.display(),
        stories = briefing.story_count(),
        "Wrote run directory"
    );
    Ok(run_dir)
}
