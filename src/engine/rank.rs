use super::aggregate::AggregatedRecord;
use super::normalize::{ProcessDetail, ProcessRecord};

/// Sort keys for top-N selection: CPU primary, memory secondary, both
/// descending.
pub trait RankKeys {
    fn cpu_key(&self) -> f64;
    fn memory_key(&self) -> f64;
}

impl RankKeys for ProcessRecord {
    fn cpu_key(&self) -> f64 {
        self.cpu_percent
    }
    fn memory_key(&self) -> f64 {
        self.memory_mb
    }
}

impl RankKeys for ProcessDetail {
    fn cpu_key(&self) -> f64 {
        self.cpu_percent
    }
    fn memory_key(&self) -> f64 {
        self.memory_mb
    }
}

impl RankKeys for AggregatedRecord {
    fn cpu_key(&self) -> f64 {
        self.cpu_percent
    }
    fn memory_key(&self) -> f64 {
        self.memory_mb
    }
}

/// Descending stable sort by `(cpu, memory)` truncated to `n`. Equal-key
/// items keep their input order (`sort_by` is stable), so identical inputs
/// always rank identically. `total_cmp` gives a total order even if a NaN
/// sneaks in.
pub fn rank_top_n<T: RankKeys>(mut items: Vec<T>, n: usize) -> Vec<T> {
    items.sort_by(|a, b| {
        b.cpu_key()
            .total_cmp(&a.cpu_key())
            .then_with(|| b.memory_key().total_cmp(&a.memory_key()))
    });
    items.truncate(n);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: u32,
        cpu: f64,
        mem: f64,
    }

    impl RankKeys for Item {
        fn cpu_key(&self) -> f64 {
            self.cpu
        }
        fn memory_key(&self) -> f64 {
            self.mem
        }
    }

    fn items(values: &[(f64, f64)]) -> Vec<Item> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(cpu, mem))| Item {
                id: i as u32,
                cpu,
                mem,
            })
            .collect()
    }

    #[test]
    fn descending_with_stable_ties_and_truncation() {
        // Input CPU order [10, 10, 30, 20], N = 3: the first 10 outranks the
        // second by input position and survives the cut.
        let ranked = rank_top_n(items(&[(10.0, 1.0), (10.0, 1.0), (30.0, 1.0), (20.0, 1.0)]), 3);
        let ids: Vec<u32> = ranked.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 3, 0]);
    }

    #[test]
    fn memory_breaks_cpu_ties() {
        let ranked = rank_top_n(items(&[(5.0, 10.0), (5.0, 99.0), (5.0, 50.0)]), 3);
        let ids: Vec<u32> = ranked.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn n_larger_than_input_keeps_everything() {
        let ranked = rank_top_n(items(&[(1.0, 0.0), (2.0, 0.0)]), 10);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn n_zero_yields_empty() {
        let ranked = rank_top_n(items(&[(1.0, 0.0)]), 0);
        assert!(ranked.is_empty());
    }
}
