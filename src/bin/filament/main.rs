//! Filament CLI - skeleton tracing and trace editing tool.
//!
//! Usage: filament [--config <FILE>] <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `filament --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use filament::algo::gaps::GapReport;
use filament::algo::{skeleton, Progress};
use filament::io;
use filament::session::EditSession;
use filament::trace::Forest;
use filament::TraceConfig;

#[derive(Parser)]
#[command(name = "filament")]
#[command(author, version, about = "Skeleton tracing and trace editing CLI", long_about = None)]
struct Cli {
    /// JSON settings file (defaults are used for missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a trace forest from skeleton points
    Build {
        /// Skeleton point file (x y z [radius [cost]] per line)
        input: PathBuf,

        /// Output forest file (.json or .swc)
        output: PathBuf,

        /// Neighbor search radius
        #[arg(short, long)]
        edge_range: Option<f64>,

        /// Distance exponent in edge weights
        #[arg(short, long)]
        power: Option<f64>,

        /// Spurs shorter than this are pruned (0 disables pruning)
        #[arg(short, long)]
        min_branch_length: Option<f64>,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Display forest information
    Info {
        /// Input forest file
        input: PathBuf,

        /// List every line
        #[arg(long)]
        lines: bool,
    },

    /// Score reconnection gaps between line endpoints
    Gaps {
        /// Input forest file
        input: PathBuf,

        /// Output style
        #[arg(short, long, value_enum, default_value = "table")]
        format: ReportFormat,

        /// Maximum endpoint distance
        #[arg(short, long)]
        max_gap: Option<f64>,
    },

    /// Merge gaps and save the result
    Merge {
        /// Input forest file
        input: PathBuf,

        /// Output forest file
        output: PathBuf,

        /// Merge gaps at or below this cost (default: configured auto-merge cost)
        #[arg(short = 'c', long, conflicts_with = "all")]
        max_cost: Option<f64>,

        /// Merge every accepted gap regardless of cost
        #[arg(long)]
        all: bool,
    },

    /// Delete short leaf lines and save the result
    Prune {
        /// Input forest file
        input: PathBuf,

        /// Output forest file
        output: PathBuf,

        /// Leaf lines shorter than this are deleted
        #[arg(short, long)]
        length: Option<f64>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    /// Aligned text table
    Table,
    /// JSON report
    Json,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => TraceConfig::load(path)?,
        None => TraceConfig::default(),
    };

    match cli.command {
        Commands::Build {
            input,
            output,
            edge_range,
            power,
            min_branch_length,
            sequential,
        } => {
            let mut options = config.skeleton.clone();
            if let Some(range) = edge_range {
                options = options.with_edge_range(range);
            }
            if let Some(power) = power {
                options = options.with_power(power);
            }
            if let Some(length) = min_branch_length {
                options = options.with_min_branch_length(length);
            }
            if sequential {
                options = options.with_parallel(false);
            }
            cmd_build(&input, &output, &options)?;
        }

        Commands::Info { input, lines } => {
            cmd_info(&input, lines)?;
        }

        Commands::Gaps {
            input,
            format,
            max_gap,
        } => {
            let mut config = config;
            if let Some(max_gap) = max_gap {
                config.gaps = config.gaps.with_max_gap(max_gap);
            }
            cmd_gaps(&input, format, config)?;
        }

        Commands::Merge {
            input,
            output,
            max_cost,
            all,
        } => {
            let mut config = config;
            if all {
                config.auto_merge_cost = f64::INFINITY;
            } else if let Some(cost) = max_cost {
                config.auto_merge_cost = cost;
            }
            cmd_merge(&input, &output, config)?;
        }

        Commands::Prune {
            input,
            output,
            length,
        } => {
            let mut config = config;
            if let Some(length) = length {
                config.small_line_length = length;
            }
            cmd_prune(&input, &output, config)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Only ever move forward.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }
        let percent = raw_percent.max(previous);

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {}", bar, space, percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_build(
    input: &Path,
    output: &Path,
    options: &skeleton::SkeletonOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = io::points::load(input)?;
    println!("Loaded: {} skeleton points", store.len());

    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Building forest (edge range {}, power {}, min branch {}, {})...",
        options.edge_range, options.power, options.min_branch_length, mode
    );

    let progress = create_progress();
    let start = Instant::now();
    let forest = skeleton::build_forest_with_progress(&store, options, &progress)?;
    let elapsed = start.elapsed();

    println!(
        "Result: {} lines, {} bits in {} trees",
        forest.num_lines(),
        forest.num_bits(),
        forest.roots().len()
    );
    io::save(&forest, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_info(input: &Path, show_lines: bool) -> Result<(), Box<dyn std::error::Error>> {
    let forest: Forest = io::load(input)?;
    let summary = forest.summary();

    println!("File: {}", input.display());
    println!("Trees: {}", summary.num_roots);
    println!("Lines: {}", summary.num_lines);
    println!("Bits: {}", summary.num_bits);
    println!("Leaves: {}", summary.num_leaves);
    println!("Branch points: {}", summary.num_branch_points);
    println!("Total length: {:.3}", summary.total_length);
    println!("Max depth: {}", summary.max_depth);

    if show_lines {
        println!();
        println!(
            "{:>8} {:>8} {:>6} {:>10} {:>8} {:>8} {:>6}",
            "line", "parent", "bits", "length", "radius", "children", "depth"
        );
        for f in forest.line_features() {
            let parent = f.parent.map_or_else(|| "-".to_string(), |p| p.to_string());
            println!(
                "{:>8} {:>8} {:>6} {:>10.3} {:>8.3} {:>8} {:>6}",
                f.id.to_string(),
                parent,
                f.num_bits,
                f.length,
                f.average_radius,
                f.num_children,
                f.depth
            );
        }
    }

    Ok(())
}

fn print_report(report: &GapReport) {
    println!(
        "Candidates: {}, accepted: {}, conflicts: {}",
        report.candidates,
        report.gaps.len(),
        report.conflicts
    );
    if report.gaps.is_empty() {
        return;
    }
    println!(
        "{:>8} {:>8} {:>8} {:>8} {:>10} {:>8} {:>8} {:>5}",
        "end1", "end2", "trace1", "trace2", "distance", "angle", "cost", "comp"
    );
    for gap in &report.gaps {
        println!(
            "{:>8} {:>8} {:>8} {:>8} {:>10.3} {:>8.3} {:>8.3} {:>5}",
            gap.end_pt1.to_string(),
            gap.end_pt2.to_string(),
            gap.trace1.to_string(),
            gap.trace2.to_string(),
            gap.distance,
            gap.angle.to_degrees(),
            gap.cost,
            gap.comp_id
        );
    }
}

fn cmd_gaps(
    input: &Path,
    format: ReportFormat,
    config: TraceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let forest = io::load(input)?;
    let session = EditSession::new(forest, config);
    let report = session.compute_gaps(&[])?;

    match format {
        ReportFormat::Table => print_report(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn cmd_merge(
    input: &Path,
    output: &Path,
    config: TraceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let forest = io::load(input)?;
    println!("Loaded: {} lines", forest.num_lines());

    let mut session = EditSession::new(forest, config);
    let start = Instant::now();
    let summary = session.auto_merge(&[])?;
    let elapsed = start.elapsed();

    println!(
        "Merged {} gaps ({} skipped, average cost {:.3})",
        summary.merged,
        summary.skipped,
        summary.average_cost()
    );
    let forest = session.into_forest();
    println!("Result: {} lines", forest.num_lines());
    io::save(&forest, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_prune(
    input: &Path,
    output: &Path,
    config: TraceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let forest = io::load(input)?;
    println!("Loaded: {} lines", forest.num_lines());

    let threshold = config.small_line_length;
    let mut session = EditSession::new(forest, config);
    let deleted = session.delete_small_lines()?;
    println!("Deleted {} leaf lines shorter than {}", deleted, threshold);

    let forest = session.into_forest();
    io::save(&forest, output)?;
    println!("Saved: {}", output.display());

    Ok(())
}
