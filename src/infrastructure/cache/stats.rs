use serde::Serialize;

/// Running counters for the bounded cache. Kept separate from the entry
/// map so a snapshot never needs to walk it.
#[derive(Debug, Default, Clone)]
pub struct StatsCounters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub errors: u64,
    /// Sum of per-entry payload estimates, maintained incrementally.
    pub estimated_memory: u64,
}

impl StatsCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub errors: u64,
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    pub estimated_memory: u64,
}

impl CacheStats {
    pub fn from_counters(counters: &StatsCounters, size: usize, max_size: usize) -> Self {
        let lookups = counters.hits + counters.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            counters.hits as f64 / lookups as f64
        };
        Self {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            evictions: counters.evictions,
            errors: counters.errors,
            size,
            max_size,
            hit_rate,
            estimated_memory: counters.estimated_memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_zero_lookups() {
        let counters = StatsCounters::default();
        let stats = CacheStats::from_counters(&counters, 0, 10);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn hit_rate_is_hits_over_lookups() {
        let mut counters = StatsCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        let stats = CacheStats::from_counters(&counters, 2, 10);
        assert_eq!(stats.hit_rate, 0.75);
    }
}
