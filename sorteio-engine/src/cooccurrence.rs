use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sorteio_db::models::{DrawRecord, PoolConfig};

/// Pairwise joint-appearance counts and phi correlations.
///
/// Both matrices are (N+1)x(N+1) so they can be indexed by number directly;
/// row and column 0 are unused. Memory is O(N^2), fine for pools of tens of
/// numbers but not meant for large pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrenceStats {
    pub matrix: Vec<Vec<u32>>,
    pub correlations: Vec<Vec<f64>>,
    pub frequency: Vec<u32>,
    pub total_draws: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairStat {
    pub a: u8,
    pub b: u8,
    pub count: u32,
    pub phi: f64,
}

impl CooccurrenceStats {
    pub fn count(&self, a: u8, b: u8) -> u32 {
        self.matrix
            .get(a as usize)
            .and_then(|row| row.get(b as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn phi(&self, a: u8, b: u8) -> f64 {
        self.correlations
            .get(a as usize)
            .and_then(|row| row.get(b as usize))
            .copied()
            .unwrap_or(0.0)
    }

    /// Unordered pairs with the highest joint count; ties broken by phi, then by numbers.
    pub fn top_pairs(&self, limit: usize) -> Vec<PairStat> {
        let size = self.frequency.len().saturating_sub(1);
        let mut pairs = Vec::with_capacity(size * size.saturating_sub(1) / 2);
        for a in 1..=size {
            for b in (a + 1)..=size {
                pairs.push(PairStat {
                    a: a as u8,
                    b: b as u8,
                    count: self.matrix[a][b],
                    phi: self.correlations[a][b],
                });
            }
        }
        pairs.sort_by(|x, y| {
            y.count
                .cmp(&x.count)
                .then(y.phi.partial_cmp(&x.phi).unwrap_or(std::cmp::Ordering::Equal))
        });
        pairs.truncate(limit);
        pairs
    }
}

/// Phi coefficient of the 2x2 table built from a joint count and two marginals.
fn phi_coefficient(joint: u32, freq_a: u32, freq_b: u32, total: usize) -> f64 {
    let n = total as f64;
    let n11 = joint as f64;
    let n10 = freq_a as f64 - n11;
    let n01 = freq_b as f64 - n11;
    let n00 = n - n11 - n10 - n01;

    let n1x = freq_a as f64;
    let n0x = n - n1x;
    let nx1 = freq_b as f64;
    let nx0 = n - nx1;

    let denominator = (n1x * n0x * nx1 * nx0).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (n11 * n00 - n10 * n01) / denominator
}

/// Counts co-draws over the whole history, then derives phi for every ordered pair.
pub fn compute_cooccurrence(draws: &[DrawRecord], pool: &PoolConfig) -> CooccurrenceStats {
    let size = pool.pool_size as usize;
    let mut matrix = vec![vec![0u32; size + 1]; size + 1];
    let mut frequency = vec![0u32; size + 1];

    for draw in draws {
        let numbers: Vec<usize> = draw
            .numbers
            .iter()
            .map(|&n| n as usize)
            .filter(|&n| n >= 1 && n <= size)
            .collect();
        for (i, &a) in numbers.iter().enumerate() {
            frequency[a] += 1;
            for &b in &numbers[i + 1..] {
                matrix[a][b] += 1;
                matrix[b][a] += 1;
            }
        }
    }

    let total = draws.len();
    let correlations: Vec<Vec<f64>> = (0..=size)
        .into_par_iter()
        .map(|i| {
            (0..=size)
                .map(|j| {
                    if i == j {
                        1.0
                    } else if i == 0 || j == 0 {
                        0.0
                    } else {
                        phi_coefficient(matrix[i][j], frequency[i], frequency[j], total)
                    }
                })
                .collect()
        })
        .collect();

    CooccurrenceStats {
        matrix,
        correlations,
        frequency,
        total_draws: total,
    }
}
