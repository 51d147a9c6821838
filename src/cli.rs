//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use soundgrab_core::SortOrder;

/// Bulk-download Freesound search results without tripping rate limits.
///
/// Every result of the query is saved once into a flat directory as
/// `<name>___<id>.<ext>`; files already present are skipped, so an
/// interrupted run can simply be started again.
#[derive(Parser, Debug)]
#[command(name = "soundgrab")]
#[command(author, version)]
pub struct Args {
    /// Free-text search query
    #[arg(short = 't', long)]
    pub text: Option<String>,

    /// File types to include (comma separated or repeated)
    #[arg(long, value_delimiter = ',', default_value = "wav")]
    pub file_types: Vec<String>,

    /// Tags to match (any of them; comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Duration range in seconds, e.g. `--duration-range 1 30`
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub duration_range: Option<Vec<f64>>,

    /// Average rating range (0-5), e.g. `--rating-range 3.5 5`
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub rating_range: Option<Vec<f64>>,

    /// Result order: rating_desc, rating_asc, downloads_desc, downloads_asc,
    /// duration_desc, duration_asc
    #[arg(long, default_value_t = SortOrder::default())]
    pub sort: SortOrder,

    /// Group results by pack
    #[arg(long)]
    pub group_packs: bool,

    /// Response fields to request (id, name, type and pack are always added)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Directory to save sounds into [default: $HOME/Downloads/freesound]
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads per page (1-32) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Maximum attempts per sound, including the first (1-10) [default: 3]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: Option<u8>,

    /// OAuth2 access token; skips the interactive authorization
    /// [env: SOUNDGRAB_ACCESS_TOKEN]
    #[arg(long)]
    pub access_token: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Returns the duration range as a `(min, max)` pair.
    #[must_use]
    pub fn duration_pair(&self) -> Option<(f64, f64)> {
        pair(self.duration_range.as_deref())
    }

    /// Returns the rating range as a `(min, max)` pair.
    #[must_use]
    pub fn rating_pair(&self) -> Option<(f64, f64)> {
        pair(self.rating_range.as_deref())
    }
}

fn pair(values: Option<&[f64]>) -> Option<(f64, f64)> {
    match values? {
        [a, b] => Some((*a, *b)),
        _ => None,
    }
}
