// src/grouping.rs

use crate::model::{Tier, TierGroups};
use crate::table::Row;
use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

/// The three region markers that decide a row's tier
pub const REGION_COLUMNS: [&str; 3] = ["stars_region", "forks_region", "watchers_region"];

/// Numeric outcome column to split by tier
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// Joined line count (`code_lines`)
    CodeLines,
    /// Bugfix recommendation count (`bugfix`)
    Bugfix,
    /// Code-improvement recommendation count (`improvingcode`)
    ImprovingCode,
}

impl Metric {
    pub fn column(self) -> &'static str {
        match self {
            Metric::CodeLines => "code_lines",
            Metric::Bugfix => "bugfix",
            Metric::ImprovingCode => "improvingcode",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Metric::CodeLines => "Code lines",
            Metric::Bugfix => "Bugfix recommendations",
            Metric::ImprovingCode => "Improving code recommendations",
        }
    }
}

/// The tier whose marker all three region columns carry, if any.
///
/// Partial agreement, missing columns and unexpected values all give `None`.
pub fn classify(row: &Row) -> Option<Tier> {
    let markers: Vec<&str> = REGION_COLUMNS
        .iter()
        .map(|column| row.get(column).map(str::trim).unwrap_or(""))
        .collect();

    Tier::ALL
        .into_iter()
        .find(|tier| markers.iter().all(|m| *m == tier.marker()))
}

/// Splits `column` values by tier. Non-integer values count as 0.
pub fn group<'a, I>(rows: I, column: &str) -> TierGroups
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut groups = TierGroups::default();
    for row in rows {
        let Some(tier) = classify(row) else {
            groups.other += 1;
            continue;
        };

        let raw = row.get(column).unwrap_or("0").trim();
        let value = raw.parse::<i64>().unwrap_or_else(|_| {
            debug!("Non-integer {} value '{}', using 0", column, raw);
            groups.coerced += 1;
            0
        });
        groups.get_mut(tier).push(value);
    }
    groups
}

pub fn group_metric<'a, I>(rows: I, metric: Metric) -> TierGroups
where
    I: IntoIterator<Item = &'a Row>,
{
    group(rows, metric.column())
}
