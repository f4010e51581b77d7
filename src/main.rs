// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use code_census::cli::{Args, Command};
use code_census::distance::{read_distances, write_distances, DistanceBatchRunner};
use code_census::grouping::{group_metric, Metric};
use code_census::join::join_files;
use code_census::line_counter::LineCounter;
use code_census::renderer::{timestamped_boxplot_name, ChartRenderer};
use code_census::report::{self, DistanceSummary, Format, GroupingReport, MetricReport, StatsReport};
use code_census::snapshot::SnapshotPairer;
use code_census::subtypes::SubtypeBreakdown;
use code_census::table::Table;
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A stage summary together with the chart it produced
#[derive(Serialize)]
struct Charted<'a, T: Serialize> {
    summary: &'a T,
    chart: &'a Path,
}

fn emit<T: Serialize>(format: Format, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        Format::Text => print!("{}", text()),
        Format::Json => println!("{}", report::to_json(value)?),
    }
    Ok(())
}

fn read_joined(path: &Path) -> Result<Table> {
    Table::read(path).with_context(|| format!("reading joined table {}", path.display()))
}

fn run(command: Command, format: Format) -> Result<()> {
    match command {
        Command::CountLines {
            root,
            extensions,
            output,
        } => {
            let output = output.unwrap_or_else(|| root.join("code_lines.csv"));
            let counter = LineCounter::new(&extensions).with_progress(ProgressBar::new(0));
            let counted = counter
                .count_to_file(&root, &output)
                .with_context(|| format!("counting lines under {}", root.display()))?;
            emit(format, &counted, || report::line_counts(&counted, &output))
        }

        Command::Join {
            projects,
            counts,
            output,
        } => {
            let output = output.unwrap_or_else(|| {
                projects
                    .parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join("projects_with_codelines.csv")
            });
            let summary = join_files(&projects, &counts, &output).context("joining line counts")?;
            emit(format, &summary, || report::join(&summary, &output))
        }

        Command::Group { joined, metric } => {
            let table = read_joined(&joined)?;
            let report = GroupingReport::new(metric, &group_metric(&table.rows, metric));
            emit(format, &report, || report.to_string())
        }

        Command::Stats { joined, metric } => {
            let metrics = if metric.is_empty() {
                vec![Metric::Bugfix, Metric::ImprovingCode]
            } else {
                metric
            };
            let table = read_joined(&joined)?;
            let reports = metrics
                .iter()
                .map(|&m| MetricReport::new(m, &group_metric(&table.rows, m)))
                .collect();
            let report = StatsReport::new(reports);
            emit(format, &report, || report.to_string())
        }

        Command::Histograms {
            joined,
            out_dir,
            prefix,
            chart,
        } => {
            let table = read_joined(&joined)?;
            let groups = group_metric(&table.rows, Metric::CodeLines);
            let renderer = ChartRenderer::new(chart.width, chart.height).with_progress(ProgressBar::new(0));
            let paths = renderer.tier_histograms(&groups, &out_dir, &prefix)?;
            emit(format, &paths, || {
                paths
                    .iter()
                    .map(|p| format!("Histogram saved to {}\n", p.display()))
                    .collect()
            })
        }

        Command::Boxplot {
            joined,
            metric,
            output,
            chart,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(timestamped_boxplot_name(metric.column())));
            let table = read_joined(&joined)?;
            let groups = group_metric(&table.rows, metric);
            ChartRenderer::new(chart.width, chart.height).tier_boxplot(&groups, &output)?;

            let report = GroupingReport::new(metric, &groups);
            let charted = Charted {
                summary: &report,
                chart: &output,
            };
            emit(format, &charted, || {
                format!("{}Boxplot saved to {}\n", report, output.display())
            })
        }

        Command::Distances {
            root,
            output,
            algorithm,
        } => {
            let started = Instant::now();
            let runner = DistanceBatchRunner::new(SnapshotPairer::default(), algorithm.strategy())
                .with_progress(ProgressBar::new(0));
            let batch = runner
                .run(&root)
                .with_context(|| format!("measuring snapshots under {}", root.display()))?;
            write_distances(&batch.records, &output)?;
            info!("Distances finished in {:.2?}", started.elapsed());
            emit(format, &batch, || report::distances(&batch, &output))
        }

        Command::DistanceStats { csv, boxplot, chart } => {
            let column = read_distances(&csv)?;
            let summary = DistanceSummary::new(&column);
            match boxplot {
                Some(path) => {
                    let values: Vec<f64> = column.values.iter().map(|&v| v as f64).collect();
                    ChartRenderer::new(chart.width, chart.height).series_boxplot(
                        "Levenshtein distance",
                        &values,
                        &path,
                    )?;
                    let charted = Charted {
                        summary: &summary,
                        chart: &path,
                    };
                    emit(format, &charted, || {
                        format!("{}Boxplot saved to {}\n", summary, path.display())
                    })
                }
                None => emit(format, &summary, || summary.to_string()),
            }
        }

        Command::Subtypes {
            csv,
            group_column,
            subtype_column,
            output,
            chart,
        } => {
            let breakdown = SubtypeBreakdown::read(&csv, &group_column, &subtype_column)?;
            ChartRenderer::new(chart.width, chart.height).subtype_bars(&breakdown, &output)?;
            let charted = Charted {
                summary: &breakdown,
                chart: &output,
            };
            emit(format, &charted, || {
                format!("{}Chart saved to {}\n", report::subtypes(&breakdown), output.display())
            })
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();
    run(args.command, args.format)?;
    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
