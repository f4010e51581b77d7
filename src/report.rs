// src/report.rs

//! Text and JSON renderings of stage results. Nothing here computes anything
//! new; `main` decides where the output goes.

use crate::distance::{DistanceColumn, DistanceReport};
use crate::grouping::Metric;
use crate::join::JoinSummary;
use crate::line_counter::LineCountReport;
use crate::model::{Tier, TierGroups};
use crate::stats::{summarize_groups, Descriptive, StatisticalResult, TestOutcome};
use crate::subtypes::SubtypeBreakdown;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Human-readable summary
    #[default]
    Text,
    /// One JSON document on stdout
    Json,
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[derive(Debug, Serialize)]
pub struct TierCount {
    pub tier: Tier,
    pub count: usize,
    pub descriptive: Option<Descriptive>,
}

/// Row counts per tier for one metric
#[derive(Debug, Serialize)]
pub struct GroupingReport {
    pub metric: Metric,
    pub tiers: Vec<TierCount>,
    pub other: usize,
    pub coerced: usize,
    pub total: usize,
}

impl GroupingReport {
    pub fn new(metric: Metric, groups: &TierGroups) -> Self {
        let tiers = groups
            .as_series()
            .into_iter()
            .map(|(tier, values)| TierCount {
                tier,
                count: values.len(),
                descriptive: Descriptive::of(&values),
            })
            .collect();
        Self {
            metric,
            tiers,
            other: groups.other,
            coerced: groups.coerced,
            total: groups.total(),
        }
    }
}

impl fmt::Display for GroupingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} by popularity tier", self.metric.title())?;
        for entry in &self.tiers {
            write!(f, "  {:<18} {:>6} rows", entry.tier.label(), entry.count)?;
            match &entry.descriptive {
                Some(d) => writeln!(f, "  {}", descriptive_line(d))?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "  {:<18} {:>6} rows", "Other", self.other)?;
        writeln!(f, "  {:<18} {:>6} rows", "Total", self.total)?;
        if self.coerced > 0 {
            writeln!(f, "  {} non-integer values counted as 0", self.coerced)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MetricReport {
    pub metric: Metric,
    pub other: usize,
    pub coerced: usize,
    pub result: StatisticalResult,
}

impl MetricReport {
    pub fn new(metric: Metric, groups: &TierGroups) -> Self {
        Self {
            metric,
            other: groups.other,
            coerced: groups.coerced,
            result: summarize_groups(groups),
        }
    }
}

/// Per-metric statistics plus the cross-metric verdict
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub metrics: Vec<MetricReport>,
    pub significant_metrics: Vec<Metric>,
}

impl StatsReport {
    pub fn new(metrics: Vec<MetricReport>) -> Self {
        let significant_metrics = metrics
            .iter()
            .filter(|m| m.result.is_significant())
            .map(|m| m.metric)
            .collect();
        Self {
            metrics,
            significant_metrics,
        }
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.metrics {
            writeln!(f, "=== {} ===", report.metric.title())?;
            for tier in &report.result.tiers {
                writeln!(f, "{}:", tier.tier.label())?;
                match &tier.descriptive {
                    Some(d) => writeln!(f, "  {}", descriptive_line(d))?,
                    None => writeln!(f, "  no data")?,
                }
                match &tier.normality {
                    TestOutcome::Computed(t) => writeln!(
                        f,
                        "  Shapiro-Wilk W={:.4}, p={} ({})",
                        t.statistic,
                        format_p(t.p_value),
                        if t.is_normal { "normal" } else { "not normal" }
                    )?,
                    TestOutcome::NotComputed(reason) => {
                        writeln!(f, "  Shapiro-Wilk not computed: {}", reason)?
                    }
                }
            }
            match &report.result.comparison {
                TestOutcome::Computed(c) => writeln!(
                    f,
                    "Kruskal-Wallis H={:.4}, df={}, p={} ({})",
                    c.statistic,
                    c.degrees_of_freedom,
                    format_p(c.p_value),
                    if c.significant {
                        "significant difference"
                    } else {
                        "no significant difference"
                    }
                )?,
                TestOutcome::NotComputed(reason) => {
                    writeln!(f, "Kruskal-Wallis not computed: {}", reason)?
                }
            }
            if report.other > 0 {
                writeln!(f, "({} rows outside any tier)", report.other)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "=== Overall ===")?;
        if self.significant_metrics.is_empty() {
            writeln!(f, "No metric differs significantly across popularity tiers")
        } else {
            let names: Vec<&str> = self.significant_metrics.iter().map(|m| m.title()).collect();
            writeln!(f, "Significant differences across tiers: {}", names.join(", "))
        }
    }
}

/// Distances read back from a CSV
#[derive(Debug, Serialize)]
pub struct DistanceSummary {
    pub values: usize,
    pub skipped: usize,
    pub descriptive: Option<Descriptive>,
}

impl DistanceSummary {
    pub fn new(column: &DistanceColumn) -> Self {
        let values: Vec<f64> = column.values.iter().map(|&v| v as f64).collect();
        Self {
            values: values.len(),
            skipped: column.skipped,
            descriptive: Descriptive::of(&values),
        }
    }
}

impl fmt::Display for DistanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Levenshtein distance statistics")?;
        match &self.descriptive {
            Some(d) => writeln!(f, "  {}", descriptive_line(d))?,
            None => writeln!(f, "  no valid distances")?,
        }
        if self.skipped > 0 {
            writeln!(f, "  {} rows skipped", self.skipped)?;
        }
        Ok(())
    }
}

pub fn line_counts(report: &LineCountReport, output: &Path) -> String {
    let mut out = format!(
        "Analyzed {} directories\nTotal lines of code: {}\n",
        report.counts.len(),
        report.total_lines()
    );
    if !report.skipped.is_empty() {
        out.push_str(&format!("Skipped {} unreadable files\n", report.skipped.len()));
    }
    out.push_str(&format!("Results saved to {}\n", output.display()));
    out
}

pub fn join(summary: &JoinSummary, output: &Path) -> String {
    let mut out = format!(
        "Total projects processed: {}\nProjects with line counts: {}\nProjects without line counts: {}\n",
        summary.total,
        summary.matched,
        summary.unmatched_count()
    );
    if summary.unidentified > 0 {
        out.push_str(&format!("Rows without an identifier: {}\n", summary.unidentified));
    }
    out.push_str(&format!("Results saved to {}\n", output.display()));
    out
}

pub fn distances(report: &DistanceReport, output: &Path) -> String {
    let mut out = format!(
        "Scanned {} folders, found {} pairs\nComputed {} distances\n",
        report.folders_scanned,
        report.pairs_found(),
        report.records.len()
    );
    for failure in &report.failures {
        out.push_str(&format!("  failed {}: {}\n", failure.pair.prefix, failure.reason));
    }
    out.push_str(&format!("Results saved to {}\n", output.display()));
    out
}

pub fn subtypes(breakdown: &SubtypeBreakdown) -> String {
    if breakdown.is_empty() {
        return "No rows with both a group and a sub-type\n".to_string();
    }
    let mut out = String::new();
    for group in breakdown.groups() {
        out.push_str(&format!("Group {} ({} total)\n", group, breakdown.group_total(group)));
        for subtype in breakdown.subtypes() {
            let count = breakdown.count(group, subtype);
            if count > 0 {
                out.push_str(&format!(
                    "  {:<24} {:>6}  {:>5.1}%\n",
                    subtype,
                    count,
                    breakdown.percentage(group, subtype)
                ));
            }
        }
    }
    out
}

fn descriptive_line(d: &Descriptive) -> String {
    let std_dev = d
        .std_dev
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "n={} mean={:.2} median={:.2} std={} min={} max={}",
        d.count, d.mean, d.median, std_dev, d.min, d.max
    )
}

fn format_p(p: f64) -> String {
    if p != 0.0 && p < 1e-4 {
        format!("{:.3e}", p)
    } else {
        format!("{:.4}", p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> TierGroups {
        TierGroups {
            lesser: vec![1, 2, 3, 4],
            medium: vec![10, 11, 12, 13],
            high: vec![20, 21, 22, 23],
            other: 2,
            coerced: 1,
        }
    }

    #[test]
    fn test_grouping_report_counts() {
        let report = GroupingReport::new(Metric::Bugfix, &groups());
        assert_eq!(report.total, 14);
        assert_eq!(report.tiers[1].count, 4);

        let text = report.to_string();
        assert!(text.contains("Medium-popularity"));
        assert!(text.contains("Total"));
        assert!(text.contains("1 non-integer values counted as 0"));
    }

    #[test]
    fn test_stats_report_overall_summary() {
        let separated = MetricReport::new(Metric::Bugfix, &groups());
        let flat = MetricReport::new(
            Metric::ImprovingCode,
            &TierGroups {
                lesser: vec![5, 5],
                medium: vec![5, 5],
                high: vec![5],
                other: 0,
                coerced: 0,
            },
        );
        let report = StatsReport::new(vec![separated, flat]);
        assert_eq!(report.significant_metrics, vec![Metric::Bugfix]);

        let text = report.to_string();
        assert!(text.contains("Kruskal-Wallis H="));
        assert!(text.contains("Kruskal-Wallis not computed: all numbers are identical"));
        assert!(text.contains("Significant differences across tiers: Bugfix recommendations"));
    }

    #[test]
    fn test_stats_report_serializes() {
        let report = StatsReport::new(vec![MetricReport::new(Metric::Bugfix, &groups())]);
        let json = to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metrics"][0]["metric"], "bugfix");
        assert_eq!(value["significant_metrics"][0], "bugfix");
    }

    #[test]
    fn test_subtypes_text_has_percentages() {
        let rows = vec![
            crate::table::Row::from_pairs([("group", "1"), ("matcha_subtype", "a")]),
            crate::table::Row::from_pairs([("group", "1"), ("matcha_subtype", "b")]),
        ];
        let text = subtypes(&SubtypeBreakdown::from_rows(&rows, "group", "matcha_subtype"));
        assert!(text.contains("Group 1 (2 total)"));
        assert!(text.contains("50.0%"));
    }

    #[test]
    fn test_stage_summaries_text() {
        let summary = JoinSummary {
            total: 3,
            matched: 1,
            unmatched: vec!["b".to_string()],
            unidentified: 1,
        };
        assert_eq!(
            join(&summary, Path::new("out.csv")),
            "Total projects processed: 3\nProjects with line counts: 1\n\
             Projects without line counts: 2\nRows without an identifier: 1\n\
             Results saved to out.csv\n"
        );

        let counts = line_counts(&LineCountReport::default(), Path::new("c.csv"));
        assert_eq!(
            counts,
            "Analyzed 0 directories\nTotal lines of code: 0\nResults saved to c.csv\n"
        );

        let text = distances(&DistanceReport::default(), Path::new("d.csv"));
        assert!(text.starts_with("Scanned 0 folders, found 0 pairs\nComputed 0 distances\n"));
        assert_eq!(
            subtypes(&SubtypeBreakdown::default()),
            "No rows with both a group and a sub-type\n"
        );
    }

    #[test]
    fn test_distance_summary_empty() {
        let summary = DistanceSummary::new(&DistanceColumn::default());
        assert!(summary.to_string().contains("no valid distances"));
    }

    #[test]
    fn test_format_p() {
        assert_eq!(format_p(0.5), "0.5000");
        assert_eq!(format_p(0.0), "0.0000");
        assert!(format_p(1e-7).contains('e'));
    }
}
