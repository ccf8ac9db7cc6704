use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sorteio_db::models::{DrawRecord, PoolConfig};

use crate::stats::{mean, population_std, ratio, sample_std, z_score};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Look-ahead, in draws, for the empirical close probability.
    pub close_window: u32,
    pub urgency_weight: f64,
    pub frequency_weight: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            close_window: 5,
            urgency_weight: 0.6,
            frequency_weight: 0.4,
        }
    }
}

/// Which per-number score drives ranking and sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Urgency,
    #[default]
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberCycleStat {
    pub number: u8,
    pub appearances: u32,
    pub last_seen: Option<u32>,
    /// Gaps, in sequence numbers, between consecutive appearances. Always > 0.
    pub historical_cycles: Vec<u32>,
    /// Draws since the last appearance; 0 right after the number is drawn.
    pub current_cycle: u32,
    pub mean: f64,
    pub stddev: f64,
    pub close_probability: f64,
    pub frequency: f64,
    pub frequency_z: f64,
    pub urgency: f64,
    pub weighted_score: f64,
}

impl NumberCycleStat {
    pub fn score(&self, kind: ScoreKind) -> f64 {
        match kind {
            ScoreKind::Urgency => self.urgency,
            ScoreKind::Weighted => self.weighted_score,
        }
    }
}

/// Per-number statistics indexed 1..=N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleTable {
    stats: Vec<NumberCycleStat>,
    pub total_draws: usize,
}

impl CycleTable {
    /// Builds a table from precomputed stats, e.g. scores coming from elsewhere.
    pub fn from_stats(mut stats: Vec<NumberCycleStat>, total_draws: usize) -> Self {
        stats.sort_by_key(|s| s.number);
        Self { stats, total_draws }
    }

    pub fn get(&self, number: u8) -> Option<&NumberCycleStat> {
        let idx = (number as usize).checked_sub(1)?;
        self.stats.get(idx).filter(|s| s.number == number).or_else(|| {
            self.stats.iter().find(|s| s.number == number)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &NumberCycleStat> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Descending by score; ties keep ascending number order.
    pub fn ranked_by(&self, kind: ScoreKind) -> Vec<&NumberCycleStat> {
        let mut ranked: Vec<&NumberCycleStat> = self.stats.iter().collect();
        ranked.sort_by(|a, b| {
            b.score(kind)
                .partial_cmp(&a.score(kind))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn most_overdue(&self, limit: usize) -> Vec<&NumberCycleStat> {
        let mut ranked = self.ranked_by(ScoreKind::Urgency);
        ranked.truncate(limit);
        ranked
    }
}

/// Cycle statistics for every number of the pool.
///
/// `draws` must be sorted by ascending sequence and hold validated numbers;
/// out-of-range numbers are ignored.
pub fn compute_cycle_stats(
    draws: &[DrawRecord],
    pool: &PoolConfig,
    config: &CycleConfig,
) -> CycleTable {
    let size = pool.pool_size as usize;
    let mut last_seen: Vec<Option<u32>> = vec![None; size + 1];
    let mut current = vec![0u32; size + 1];
    let mut appearances = vec![0u32; size + 1];
    let mut cycles: Vec<Vec<u32>> = vec![Vec::new(); size + 1];
    let mut present = vec![false; size + 1];

    for draw in draws {
        present.iter_mut().for_each(|p| *p = false);
        for &n in &draw.numbers {
            let idx = n as usize;
            if idx == 0 || idx > size {
                continue;
            }
            present[idx] = true;
            if let Some(prev) = last_seen[idx] {
                let gap = draw.sequence.saturating_sub(prev);
                if gap > 0 {
                    cycles[idx].push(gap);
                }
            }
            last_seen[idx] = Some(draw.sequence);
            appearances[idx] += 1;
            current[idx] = 0;
        }
        for idx in 1..=size {
            if !present[idx] {
                current[idx] += 1;
            }
        }
    }

    let total_draws = draws.len();
    let window = config.close_window;

    let mut stats: Vec<NumberCycleStat> = cycles
        .into_par_iter()
        .enumerate()
        .skip(1)
        .map(|(idx, historical_cycles)| {
            let samples: Vec<f64> = historical_cycles.iter().map(|&c| c as f64).collect();
            let mean = mean(&samples);
            let stddev = sample_std(&samples);
            let current_cycle = current[idx];

            let survivors: Vec<u32> = historical_cycles
                .iter()
                .copied()
                .filter(|&c| c >= current_cycle)
                .collect();
            let closed = survivors
                .iter()
                .filter(|&&c| c <= current_cycle + window)
                .count();
            let close_probability = ratio(closed as f64, survivors.len() as f64);

            let urgency = if stddev != 0.0 {
                ((current_cycle as f64 - mean) / stddev).max(0.0)
            } else {
                0.0
            };

            NumberCycleStat {
                number: idx as u8,
                appearances: appearances[idx],
                last_seen: last_seen[idx],
                frequency: ratio(historical_cycles.len() as f64, total_draws as f64),
                historical_cycles,
                current_cycle,
                mean,
                stddev,
                close_probability,
                frequency_z: 0.0,
                urgency,
                weighted_score: 0.0,
            }
        })
        .collect();

    let frequencies: Vec<f64> = stats.iter().map(|s| s.frequency).collect();
    let freq_mean = mean(&frequencies);
    let freq_std = population_std(&frequencies);

    for stat in &mut stats {
        stat.frequency_z = z_score(stat.frequency, freq_mean, freq_std);
        stat.weighted_score =
            config.urgency_weight * stat.urgency + config.frequency_weight * stat.frequency_z;
    }

    log::debug!(
        "cycle stats: {} numbers over {} draws",
        stats.len(),
        total_draws
    );

    CycleTable { stats, total_draws }
}
