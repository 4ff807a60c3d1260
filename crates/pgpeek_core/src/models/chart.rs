//! Chart input models.

use crate::models::query::Record;

use serde::{Deserialize, Serialize};

/// The fixed chart schemas the dashboard knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Fault counts over time.
    Faults,
    /// Completed / failed jobs over time.
    Jobs,
    /// Fleet status.
    Bots,
}

impl ChartKind {
    /// All chart kinds in display order.
    pub const ALL: [ChartKind; 3] = [ChartKind::Faults, ChartKind::Jobs, ChartKind::Bots];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faults => "faults",
            Self::Jobs => "jobs",
            Self::Bots => "bots",
        }
    }

    /// Parse from string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "faults" => Some(Self::Faults),
            "jobs" => Some(Self::Jobs),
            "bots" => Some(Self::Bots),
            _ => None,
        }
    }

    /// The chart a table feeds, matched on its name.
    pub fn for_table(table: &str) -> Option<Self> {
        Self::parse(table)
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where chart rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    /// Rows of the last query, passed through unmodified.
    Live,
    /// Seeded sample data.
    Sample,
}

/// Rows ready for a chart widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Target chart.
    pub kind: ChartKind,
    /// Origin of `rows`.
    pub source: ChartSource,
    /// Chart input rows.
    pub rows: Vec<Record>,
}

impl ChartData {
    /// Whether the rows are sample data.
    pub fn is_sample(&self) -> bool {
        self.source == ChartSource::Sample
    }
}
