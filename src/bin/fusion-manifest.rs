use std::{path::PathBuf, process::ExitCode, sync::OnceLock};

use clap::Parser;

use fusion_manifest::{
    util, Error, ItemProgress, Manifest, DEFAULT_MANIFEST_URL, DEFAULT_OUTPUT_PATH,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::*;

/// Download and normalise the dbt Fusion CLI manifest so it can be cached for offline installs.
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Manifest URL to download. Local file paths are read directly
    #[clap(long, default_value = DEFAULT_MANIFEST_URL)]
    url: String,

    /// Restrict the output to a single fusion version
    #[clap(long)]
    version: Option<String>,

    /// Path to write the manifest
    #[clap(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,
}

#[derive(Debug)]
struct DownloadProgress {
    bar: ProgressBar,
}
impl DownloadProgress {
    fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template(
                "[{bar:40.cyan/blue}] {bytes} / {total_bytes} ({eta}) {wide_msg:>}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }

    fn update(&self, name: &str, progress: ItemProgress) {
        match progress {
            ItemProgress::Downloading(current, total) => {
                if self.bar.is_hidden() {
                    self.bar.set_draw_target(ProgressDrawTarget::stderr());
                    self.bar.set_message(name.to_string());
                }
                if total != 0 {
                    self.bar.set_length(total);
                }
                self.bar.set_position(current);
            }
            ItemProgress::Completed(_) | ItemProgress::Failed => {
                self.bar.finish_and_clear();
            }
        }
    }
}

static PROGRESS: OnceLock<DownloadProgress> = OnceLock::new();
fn progress_callback(name: &str, progress: ItemProgress) {
    if let Some(p) = PROGRESS.get() {
        p.update(name, progress);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    PROGRESS.set(DownloadProgress::new()).unwrap();

    let args = Cli::parse();
    match update_manifest(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn update_manifest(args: Cli) -> Result<(), Error> {
    let manifest = Manifest::fetch(&args.url, Some(progress_callback)).await?;
    let filtered = manifest.filter(args.version.as_deref())?;
    filtered.write(&args.output)?;
    println!(
        "Wrote manifest with {} version(s) to {}",
        filtered.version_count(),
        util::display_path(&args.output)
    );
    Ok(())
}
