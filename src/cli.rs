// src/cli.rs

use crate::edit_distance::Algorithm;
use crate::grouping::Metric;
use crate::renderer::HISTOGRAM_PREFIX;
use crate::report::Format;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log progress and per-item decisions to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for the stage summary
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count non-blank source lines per owner/project directory
    CountLines {
        /// Root holding <owner>/<project> directories
        root: PathBuf,

        /// File extensions to count (repeatable)
        #[arg(long = "ext", default_values_t = [".java".to_string()])]
        extensions: Vec<String>,

        /// Counts CSV [default: <ROOT>/code_lines.csv]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Attach line counts to a projects table
    Join {
        #[arg(long)]
        projects: PathBuf,

        #[arg(long)]
        counts: PathBuf,

        /// Joined CSV [default: projects_with_codelines.csv next to --projects]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split one metric by popularity tier
    Group {
        /// Joined projects CSV
        joined: PathBuf,

        #[arg(long, value_enum, default_value_t = Metric::CodeLines)]
        metric: Metric,
    },

    /// Normality and tier-comparison tests per metric
    Stats {
        /// Joined projects CSV
        joined: PathBuf,

        /// Metrics to test (repeatable) [default: bugfix, improving-code]
        #[arg(long, value_enum)]
        metric: Vec<Metric>,
    },

    /// One code-size histogram per popularity tier
    Histograms {
        /// Joined projects CSV
        joined: PathBuf,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long, default_value = HISTOGRAM_PREFIX)]
        prefix: String,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Boxplot comparing tiers for one metric
    Boxplot {
        /// Joined projects CSV
        joined: PathBuf,

        #[arg(long, value_enum, default_value_t = Metric::Bugfix)]
        metric: Metric,

        /// Image path [default: <metric>_boxplot_<timestamp>.png]
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Edit distances between before/after snapshot pairs
    Distances {
        /// Directory whose subfolders hold the snapshots
        root: PathBuf,

        #[arg(short, long, default_value = "levenshtein_distances.csv")]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Algorithm::TwoRow)]
        algorithm: Algorithm,
    },

    /// Summarize a distances CSV
    DistanceStats {
        csv: PathBuf,

        /// Also render a boxplot to this path
        #[arg(long)]
        boxplot: Option<PathBuf>,

        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Sub-type counts per group, with a grouped bar chart
    Subtypes {
        csv: PathBuf,

        #[arg(long, default_value = crate::subtypes::DEFAULT_GROUP_COLUMN)]
        group_column: String,

        #[arg(long, default_value = crate::subtypes::DEFAULT_SUBTYPE_COLUMN)]
        subtype_column: String,

        #[arg(short, long, default_value = "subtype_counts.png")]
        output: PathBuf,

        #[command(flatten)]
        chart: ChartArgs,
    },
}

#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct ChartArgs {
    /// Width of the output images in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Height of the output images in pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_count_lines_defaults() {
        let args = Args::parse_from(["code-census", "count-lines", "/data"]);
        match args.command {
            Command::CountLines { extensions, output, .. } => {
                assert_eq!(extensions, vec![".java"]);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(args.format, Format::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from([
            "code-census",
            "stats",
            "joined.csv",
            "--metric",
            "bugfix",
            "--metric",
            "code-lines",
            "--format",
            "json",
            "-v",
        ]);
        assert!(args.verbose);
        assert_eq!(args.format, Format::Json);
        match args.command {
            Command::Stats { metric, .. } => {
                assert_eq!(metric, vec![Metric::Bugfix, Metric::CodeLines])
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_distances_algorithm_choice() {
        let args = Args::parse_from(["code-census", "distances", "root", "--algorithm", "matrix"]);
        match args.command {
            Command::Distances { algorithm, output, .. } => {
                assert_eq!(algorithm, Algorithm::Matrix);
                assert_eq!(output, PathBuf::from("levenshtein_distances.csv"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
