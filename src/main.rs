mod annotator;
mod discover;
mod error;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use annotator::{Outcome, RunOptions};
use discover::{Class, ExclusionRules};
use error::AnnotateError;
use settings::{Overrides, SiteConfig};

#[derive(Parser)]
#[command(
    name = "page_annotator",
    about = "Idempotent SEO, analytics and ad tag injector for static HTML sites"
)]
struct Cli {
    /// TOML file layered over the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override SITE_URL
    #[arg(long, global = true)]
    site_url: Option<String>,
    /// Override SITE_NAME
    #[arg(long, global = true)]
    site_name: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Strip old blocks and legacy snippets, then inject fresh blocks
    Run {
        /// Site root (default: current directory)
        root: Option<PathBuf>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove every managed block and legacy snippet without re-injecting
    Strip {
        root: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List discovered documents with their classification
    List { root: Option<PathBuf> },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let overrides = Overrides {
        config_file: cli.config,
        site_url: cli.site_url,
        site_name: cli.site_name,
    };
    let cfg = SiteConfig::load(&overrides).context("Failed to load site configuration")?;
    info!("Site: {} ({})", cfg.site_name, cfg.site_url);

    match cli.command {
        Commands::Run { root, dry_run } => {
            let opts = RunOptions {
                strip_all: false,
                dry_run,
            };
            annotate_tree(&resolve_root(root)?, &cfg, opts)?.print(dry_run);
        }
        Commands::Strip { root, dry_run } => {
            let opts = RunOptions {
                strip_all: true,
                dry_run,
            };
            annotate_tree(&resolve_root(root)?, &cfg, opts)?.print(dry_run);
        }
        Commands::List { root } => {
            let root = resolve_root(root)?;
            let rules = ExclusionRules::from_config(&cfg);
            let docs = discover::discover_documents(&root, &rules);
            for path in &docs {
                let rel = discover::relative_path(&root, path);
                let class = rules.classify(&rel);
                let url = match class {
                    Class::Skip => String::new(),
                    _ => annotator::derive::canonical_url(&rel, &cfg.site_url),
                };
                println!("{:<10} | {:<40} | {}", class.label(), truncate(&rel, 40), url);
            }
            println!("\n{} HTML documents", docs.len());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn resolve_root(root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = root.unwrap_or_else(|| PathBuf::from("."));
    if !root.is_dir() {
        return Err(AnnotateError::RootNotFound(root).into());
    }
    Ok(root)
}

#[derive(Default)]
struct RunSummary {
    scanned: usize,
    changed: usize,
    skipped: usize,
    failed: usize,
}

impl RunSummary {
    fn print(&self, dry_run: bool) {
        let verb = if dry_run { "Would update" } else { "Updated" };
        println!("Done. {} {}/{} HTML files.", verb, self.changed, self.scanned);
        if self.skipped > 0 {
            println!("Skipped {} excluded files.", self.skipped);
        }
        if self.failed > 0 {
            println!("{} files failed, see log above.", self.failed);
        }
    }
}

fn annotate_tree(root: &Path, cfg: &SiteConfig, opts: RunOptions) -> anyhow::Result<RunSummary> {
    let rules = ExclusionRules::from_config(cfg);
    let docs = discover::discover_documents(root, &rules);

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut summary = RunSummary {
        scanned: docs.len(),
        ..Default::default()
    };

    for path in &docs {
        let rel = discover::relative_path(root, path);
        match annotator::process_document(path, &rel, cfg, &rules, opts) {
            Ok(Outcome::Written) => {
                summary.changed += 1;
                pb.suspend(|| info!("Updated: {}", rel));
            }
            Ok(Outcome::WouldWrite) => {
                summary.changed += 1;
                pb.suspend(|| info!("Would update: {}", rel));
            }
            Ok(Outcome::Unchanged) => {}
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                summary.failed += 1;
                pb.suspend(|| error!("{}", e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
