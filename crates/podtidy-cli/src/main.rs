use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "podtidy", version, about = "Organize downloaded podcast episodes by date and episode number")]
struct Cli {
    /// Podcast folder holding the episode files
    folder: PathBuf,

    /// Podcast name (default: folder name without its "(...)" suffix)
    #[arg(long)]
    name: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = "podtidy.toml")]
    config: PathBuf,

    /// Saved RSS/Atom feed used to fill in missing episode numbers
    #[arg(long)]
    rss: Option<PathBuf>,

    /// Ledger file (default: `ledger_file` from the config)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Forget what the ledger remembers about this podcast
    #[arg(long)]
    refresh: bool,

    /// Move this year's episodes into their own folder
    #[arg(long)]
    split: bool,

    /// Skip all episode-number passes
    #[arg(long)]
    skip_numbering: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    let config = podtidy_core::Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let options = podtidy_core::ProcessOptions {
        folder: cli.folder,
        name: cli.name,
        rss: cli.rss,
        ledger: cli.ledger,
        refresh: cli.refresh,
        split: cli.split,
        skip_numbering: cli.skip_numbering,
    };

    let result = podtidy_core::process(&options, &config)?;

    eprintln!(
        "Done! {}: {} files analyzed, {} skipped, {} with unknown date ({:.2}s)",
        result.name,
        result.analysis.analyzed,
        result.analysis.skipped,
        result.analysis.unknown_dates,
        t_total.elapsed().as_secs_f64()
    );
    eprintln!(
        "  episodes {} .. {} (all time {} .. {})",
        result.first_date.as_deref().unwrap_or("?"),
        result.last_date.as_deref().unwrap_or("?"),
        result.all_time_first.as_deref().unwrap_or("?"),
        result.all_time_last.as_deref().unwrap_or("?"),
    );
    if let Some(d) = result.durations {
        eprintln!("  duration avg {:.0}s, min {:.0}s, max {:.0}s", d.average, d.min, d.max);
    }
    let bitrates: Vec<String> = result.bitrates.iter().map(|(k, n)| format!("{} x{}", k, n)).collect();
    eprintln!("  bitrate {} ({})", if result.all_vbr { "VBR" } else { "mixed/CBR" }, bitrates.join(", "));
    if let Some(split) = &result.split {
        eprintln!("  moved {} files to {}", split.moved.len(), split.folder.display());
    }
    if let Some(report) = &result.numbering {
        eprintln!(
            "  numbering: {} reordered, {} padded, {} assigned from feed",
            report.reordered,
            report.padded,
            report.assignments.len()
        );
    }
    for warning in &result.warnings {
        eprintln!("  warning: {}", warning);
    }

    Ok(())
}
