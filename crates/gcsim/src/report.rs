//! Run report
//!
//! Rendered as a fixed `=== STATS ===` block for people and scripts that
//! scrape it, or serialized to JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::collector::{Collector, Generation};
use crate::engine::EngineTotals;

/// Summary of a whole run across every worker
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub seconds_taken: f64,
    pub num_young_gcs: u64,
    pub num_old_gcs: u64,
    pub num_full_gcs: u64,
    pub total_allocated_bytes: u64,
    pub total_allocated_count: u64,
    pub total_survived_count: u64,
    pub final_total_memory_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_heap_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_fragmentation_bytes: Option<u64>,
    /// Per-worker totals, ordered by thread index
    pub threads: Vec<EngineTotals>,
}

impl RunReport {
    /// Aggregate worker totals and read the collector's final figures
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        seconds_taken: f64,
        collector: &dyn Collector,
        mut threads: Vec<EngineTotals>,
    ) -> Self {
        threads.sort_by_key(|t| t.thread_index);
        let heap_info = collector.heap_info();

        Self {
            start,
            end,
            seconds_taken,
            num_young_gcs: collector.collection_count(Generation::Young),
            num_old_gcs: collector.collection_count(Generation::Old),
            num_full_gcs: collector.collection_count(Generation::Full),
            total_allocated_bytes: threads.iter().map(|t| t.allocated_bytes).sum(),
            total_allocated_count: threads.iter().map(|t| t.allocated_count).sum(),
            total_survived_count: threads.iter().map(|t| t.survived_count).sum(),
            final_total_memory_bytes: collector.total_memory(),
            final_heap_size_bytes: heap_info.map(|h| h.heap_size_bytes),
            final_fragmentation_bytes: heap_info.map(|h| h.fragmented_bytes),
            threads,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== STATS ===")?;
        writeln!(f, "start: {}", self.start.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        writeln!(f, "end: {}", self.end.to_rfc3339_opts(SecondsFormat::Millis, true))?;
        writeln!(f, "seconds_taken: {:.3}", self.seconds_taken)?;
        writeln!(f, "num_young_gcs: {}", self.num_young_gcs)?;
        writeln!(f, "num_old_gcs: {}", self.num_old_gcs)?;
        writeln!(f, "num_full_gcs: {}", self.num_full_gcs)?;
        writeln!(f, "total_allocated_bytes: {}", self.total_allocated_bytes)?;
        writeln!(f, "total_allocated_count: {}", self.total_allocated_count)?;
        writeln!(f, "total_survived_count: {}", self.total_survived_count)?;
        writeln!(f, "final_total_memory_bytes: {}", self.final_total_memory_bytes)?;
        if let Some(bytes) = self.final_heap_size_bytes {
            writeln!(f, "final_heap_size_bytes: {}", bytes)?;
        }
        if let Some(bytes) = self.final_fragmentation_bytes {
            writeln!(f, "final_fragmentation_bytes: {}", bytes)?;
        }
        Ok(())
    }
}
