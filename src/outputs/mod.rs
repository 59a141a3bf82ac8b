//! Output generation: static HTML pages and the rolling archive index.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── archive.html            # rolling 14-day index of runs
//! ├── 2025-10-17T06-30/       # one directory per run
//! │   ├── index.html          # grouped story listing
//! │   ├── 001-patch-lands.html
//! │   └── 002-beta-opens.html
//! └── 2025-10-16T06-30/
//!     └── ...
//! ```
//!
//! The `index.html` markup doubles as the persisted-artifact contract the
//! History Reader extracts prior stories from; changing its structure
//! silently degrades history-awareness on later runs.

pub mod archive;
pub mod html;
