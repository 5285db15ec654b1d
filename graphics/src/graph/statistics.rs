//! Per-graph counters.

use std::time::Duration;

use crate::types::QueueKind;

/// CPU time spent recording one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTiming {
    /// Pass name.
    pub name: String,
    /// Queue the pass ran on.
    pub queue: QueueKind,
    /// Time from command buffer begin to finish, execute included.
    pub record_time: Duration,
}

/// What the last compile and evaluate of a graph produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStatistics {
    /// Declared passes.
    pub pass_count: usize,
    /// Declared virtual resources.
    pub resource_count: usize,
    /// Barriers of every kind, ownership transfer halves included.
    pub barrier_count: usize,
    /// Release/acquire pairs.
    pub ownership_transfers: usize,
    /// Semaphores created for cross-queue edges.
    pub semaphore_count: usize,
    /// Queue submissions made by evaluate.
    pub submission_count: usize,
    /// Time spent in compile.
    pub compile_time: Duration,
    /// Recording time per pass, in declaration order.
    pub pass_timings: Vec<PassTiming>,
}

impl GraphStatistics {
    /// Sum of all pass recording times.
    pub fn total_record_time(&self) -> Duration {
        self.pass_timings.iter().map(|t| t.record_time).sum()
    }

    /// The pass that took longest to record.
    pub fn slowest_pass(&self) -> Option<&PassTiming> {
        self.pass_timings.iter().max_by_key(|t| t.record_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(name: &str, micros: u64) -> PassTiming {
        PassTiming {
            name: name.to_string(),
            queue: QueueKind::Graphics,
            record_time: Duration::from_micros(micros),
        }
    }

    #[test]
    fn test_total_and_slowest() {
        let stats = GraphStatistics {
            pass_timings: vec![timing("shadow", 40), timing("main", 120), timing("post", 15)],
            ..Default::default()
        };
        assert_eq!(stats.total_record_time(), Duration::from_micros(175));
        assert_eq!(stats.slowest_pass().map(|t| t.name.as_str()), Some("main"));
    }

    #[test]
    fn test_empty_statistics() {
        let stats = GraphStatistics::default();
        assert_eq!(stats.total_record_time(), Duration::ZERO);
        assert!(stats.slowest_pass().is_none());
    }
}
