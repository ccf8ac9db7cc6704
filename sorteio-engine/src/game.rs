use serde::{Deserialize, Serialize};
use std::fmt;

use sorteio_db::models::PoolConfig;

use crate::error::{EngineError, Result};

/// A candidate game: a sorted set of distinct numbers.
/// Derived metrics are computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Game {
    numbers: Vec<u8>,
}

impl Game {
    /// Sorts the numbers and rejects duplicates or numbers outside the pool.
    pub fn new(mut numbers: Vec<u8>, pool: &PoolConfig) -> Result<Self> {
        numbers.sort_unstable();
        for &n in &numbers {
            if !pool.contains(n) {
                return Err(EngineError::NumberOutOfRange {
                    number: n,
                    pool_size: pool.pool_size,
                });
            }
        }
        if let Some(w) = numbers.windows(2).find(|w| w[0] == w[1]) {
            return Err(EngineError::DuplicateNumber(w[0]));
        }
        Ok(Self { numbers })
    }

    /// For numbers already known to be distinct and in range.
    pub(crate) fn from_distinct(mut numbers: Vec<u8>) -> Self {
        numbers.sort_unstable();
        debug_assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        Self { numbers }
    }

    pub fn numbers(&self) -> &[u8] {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn contains(&self, number: u8) -> bool {
        self.numbers.binary_search(&number).is_ok()
    }

    pub fn sum(&self) -> u32 {
        self.numbers.iter().map(|&n| n as u32).sum()
    }

    pub fn even_count(&self) -> usize {
        self.numbers.iter().filter(|&&n| n % 2 == 0).count()
    }

    pub fn frame_count(&self, pool: &PoolConfig) -> usize {
        self.numbers.iter().filter(|&&n| pool.is_frame(n)).count()
    }

    pub fn prime_count(&self, pool: &PoolConfig) -> usize {
        self.numbers.iter().filter(|&&n| pool.is_prime(n)).count()
    }

    pub fn fibonacci_count(&self, pool: &PoolConfig) -> usize {
        self.numbers.iter().filter(|&&n| pool.is_fibonacci(n)).count()
    }

    pub fn amplitude(&self) -> u8 {
        match (self.numbers.first(), self.numbers.last()) {
            (Some(&lo), Some(&hi)) => hi - lo,
            _ => 0,
        }
    }

    /// Lengths of maximal runs of consecutive numbers, in ascending order of position.
    pub fn runs(&self) -> Vec<usize> {
        let mut runs = Vec::new();
        let mut current = 0usize;
        for (i, &n) in self.numbers.iter().enumerate() {
            if i > 0 && n == self.numbers[i - 1] + 1 {
                current += 1;
            } else {
                if current > 0 {
                    runs.push(current);
                }
                current = 1;
            }
        }
        if current > 0 {
            runs.push(current);
        }
        runs
    }

    pub fn longest_run(&self) -> usize {
        self.runs().into_iter().max().unwrap_or(0)
    }

    /// How many numbers of this game appear in `draw`.
    pub fn hits(&self, draw: &[u8]) -> usize {
        draw.iter().filter(|&&n| self.contains(n)).count()
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.numbers.iter().map(|n| format!("{:02}", n)).collect();
        write!(f, "{}", parts.join(" - "))
    }
}
