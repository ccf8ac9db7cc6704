use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sorteio_db::models::PoolConfig;

use crate::error::{EngineError, Result};
use crate::game::Game;
use crate::quality::QualityRules;

const CHUNK_TRIALS: usize = 10_000;

/// Inclusive bands of the "balanced game" predicate. Counts are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceBands {
    /// Numbers shared with the reference draw; ignored without one.
    pub repeats: (usize, usize),
    pub even: (usize, usize),
    pub sum: (u32, u32),
    pub frame: (usize, usize),
    pub prime: (usize, usize),
    /// Distinct grid rows the game must touch.
    pub min_rows: usize,
}

impl Default for BalanceBands {
    /// Mega-Sena, six numbers.
    fn default() -> Self {
        Self {
            repeats: (0, 1),
            even: (2, 4),
            sum: (130, 240),
            frame: (2, 4),
            prime: (1, 3),
            min_rows: 4,
        }
    }
}

fn count_band(game_size: usize, (lo, hi): (f64, f64)) -> (usize, usize) {
    let m = game_size as f64;
    let lo = (m * lo).ceil() as usize;
    let hi = ((m * hi).floor() as usize).max(lo);
    (lo, hi.min(game_size))
}

impl BalanceBands {
    /// Bands for any pool and game size, scaled with the default quality fractions.
    /// The repeat band is centred on the expected overlap `m * k / N`.
    pub fn proportional(pool: &PoolConfig, game_size: usize) -> Self {
        let rules = QualityRules::default();
        let expected_sum = game_size as f64 * pool.average();

        let expected_repeats = if pool.pool_size == 0 {
            0.0
        } else {
            game_size as f64 * pool.draw_size as f64 / pool.pool_size as f64
        };
        let spread = expected_repeats.sqrt().floor();
        let repeats = (
            (expected_repeats.floor() - spread).max(0.0) as usize,
            ((expected_repeats.ceil() + spread) as usize).min(game_size),
        );

        Self {
            repeats,
            even: count_band(game_size, rules.even_range),
            sum: (
                (expected_sum * rules.sum_range.0).ceil() as u32,
                (expected_sum * rules.sum_range.1).floor() as u32,
            ),
            frame: count_band(game_size, rules.frame_range),
            prime: count_band(game_size, rules.prime_range),
            min_rows: (game_size * 2)
                .div_ceil(3)
                .min(pool.grid_rows() as usize),
        }
    }
}

fn within<T: PartialOrd>(value: T, (lo, hi): (T, T)) -> bool {
    value >= lo && value <= hi
}

/// The balanced predicate used by the simulator. Unrelated to the quality score.
pub fn is_balanced(
    game: &Game,
    reference: Option<&[u8]>,
    bands: &BalanceBands,
    pool: &PoolConfig,
) -> bool {
    if let Some(draw) = reference {
        if !within(game.hits(draw), bands.repeats) {
            return false;
        }
    }
    let mut rows: Vec<u8> = game.numbers().iter().map(|&n| pool.row_of(n)).collect();
    rows.dedup();

    within(game.even_count(), bands.even)
        && within(game.sum(), bands.sum)
        && within(game.frame_count(pool), bands.frame)
        && within(game.prime_count(pool), bands.prime)
        && rows.len() >= bands.min_rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub game_size: usize,
    pub trials: usize,
    pub balanced_trials: usize,
    pub probability_of_balanced: f64,
    /// Indexed by count, 0..=game_size.
    pub frame_histogram: Vec<u64>,
    pub prime_histogram: Vec<u64>,
    pub fibonacci_histogram: Vec<u64>,
    pub sum_histogram: BTreeMap<u32, u64>,
}

impl SimulationResult {
    pub fn empty(game_size: usize) -> Self {
        Self {
            game_size,
            trials: 0,
            balanced_trials: 0,
            probability_of_balanced: 0.0,
            frame_histogram: vec![0; game_size + 1],
            prime_histogram: vec![0; game_size + 1],
            fibonacci_histogram: vec![0; game_size + 1],
            sum_histogram: BTreeMap::new(),
        }
    }

    /// Folds another batch of the same game size into this one.
    pub fn merge(&mut self, other: &SimulationResult) {
        self.trials += other.trials;
        self.balanced_trials += other.balanced_trials;
        for (dst, src) in [
            (&mut self.frame_histogram, &other.frame_histogram),
            (&mut self.prime_histogram, &other.prime_histogram),
            (&mut self.fibonacci_histogram, &other.fibonacci_histogram),
        ] {
            if dst.len() < src.len() {
                dst.resize(src.len(), 0);
            }
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
        for (&sum, &count) in &other.sum_histogram {
            *self.sum_histogram.entry(sum).or_insert(0) += count;
        }
        self.refresh_probability();
    }

    fn refresh_probability(&mut self) {
        self.probability_of_balanced = if self.trials == 0 {
            0.0
        } else {
            self.balanced_trials as f64 / self.trials as f64
        };
    }

    fn record(&mut self, game: &Game, balanced: bool, pool: &PoolConfig) {
        self.trials += 1;
        if balanced {
            self.balanced_trials += 1;
        }
        self.frame_histogram[game.frame_count(pool)] += 1;
        self.prime_histogram[game.prime_count(pool)] += 1;
        self.fibonacci_histogram[game.fibonacci_count(pool)] += 1;
        *self.sum_histogram.entry(game.sum()).or_insert(0) += 1;
    }
}

/// Game sizes the simulator accepts: the pool's bet range, never more than the pool.
pub fn check_game_size(game_size: usize, pool: &PoolConfig) -> Result<()> {
    if game_size < pool.min_per_game
        || game_size > pool.max_per_game
        || game_size > pool.pool_size as usize
    {
        return Err(EngineError::GameSize {
            size: game_size,
            min: pool.min_per_game,
            max: pool.max_per_game,
        });
    }
    Ok(())
}

/// Draws `trials` uniform games of `game_size` numbers and tallies how they look.
pub fn run_simulation<R: Rng + ?Sized>(
    trials: usize,
    reference: Option<&[u8]>,
    game_size: usize,
    bands: &BalanceBands,
    pool: &PoolConfig,
    rng: &mut R,
) -> Result<SimulationResult> {
    check_game_size(game_size, pool)?;

    let mut result = SimulationResult::empty(game_size);
    for _ in 0..trials {
        let numbers: Vec<u8> = sample(rng, pool.pool_size as usize, game_size)
            .into_iter()
            .map(|i| i as u8 + 1)
            .collect();
        let game = Game::from_distinct(numbers);
        let balanced = is_balanced(&game, reference, bands, pool);
        result.record(&game, balanced, pool);
    }
    result.refresh_probability();
    Ok(result)
}

/// Same as `run_simulation`, split into fixed chunks seeded `seed + chunk` and run
/// on the rayon pool. The outcome depends on the seed only, not on the thread count.
pub fn run_parallel(
    trials: usize,
    seed: u64,
    reference: Option<&[u8]>,
    game_size: usize,
    bands: &BalanceBands,
    pool: &PoolConfig,
) -> Result<SimulationResult> {
    check_game_size(game_size, pool)?;

    let chunks = trials.div_ceil(CHUNK_TRIALS);
    let partials: Vec<SimulationResult> = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let start = chunk * CHUNK_TRIALS;
            let len = CHUNK_TRIALS.min(trials - start);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(chunk as u64));
            run_simulation(len, reference, game_size, bands, pool, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = SimulationResult::empty(game_size);
    for partial in &partials {
        result.merge(partial);
    }
    result.refresh_probability();

    log::debug!(
        "simulated {} trials in {} chunks, {} balanced",
        result.trials,
        chunks,
        result.balanced_trials
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(numbers: &[u8]) -> Game {
        Game::new(numbers.to_vec(), &PoolConfig::mega_sena()).unwrap()
    }

    #[test]
    fn test_balanced_predicate() {
        let pool = PoolConfig::mega_sena();
        let bands = BalanceBands::default();
        // sum 180, 2 even, frame 4 and 51, primes 17 and 29, rows 1, 2, 3, 4, 5, 6
        let good = game(&[4, 17, 29, 34, 45, 51]);
        assert!(is_balanced(&good, None, &bands, &pool));

        // too many repeats from the reference draw
        let reference = [4, 17, 29, 1, 2, 3];
        assert!(!is_balanced(&good, Some(&reference), &bands, &pool));

        // all in the first row
        assert!(!is_balanced(&game(&[1, 2, 3, 4, 5, 6]), None, &bands, &pool));
    }

    #[test]
    fn test_histograms_account_for_every_trial() {
        let pool = PoolConfig::mega_sena();
        let mut rng = StdRng::seed_from_u64(11);
        let result =
            run_simulation(2_000, None, 6, &BalanceBands::default(), &pool, &mut rng).unwrap();

        assert_eq!(result.trials, 2_000);
        assert_eq!(result.frame_histogram.len(), 7);
        assert_eq!(result.frame_histogram.iter().sum::<u64>(), 2_000);
        assert_eq!(result.prime_histogram.iter().sum::<u64>(), 2_000);
        assert_eq!(result.fibonacci_histogram.iter().sum::<u64>(), 2_000);
        assert_eq!(result.sum_histogram.values().sum::<u64>(), 2_000);
        assert!(result.sum_histogram.keys().all(|&s| (21..=345).contains(&s)));
        assert!(result.balanced_trials <= result.trials);
        assert!(result.probability_of_balanced > 0.0 && result.probability_of_balanced < 1.0);
    }

    #[test]
    fn test_zero_trials() {
        let pool = PoolConfig::mega_sena();
        let mut rng = StdRng::seed_from_u64(1);
        let result = run_simulation(0, None, 6, &BalanceBands::default(), &pool, &mut rng).unwrap();
        assert_eq!(result.trials, 0);
        assert_eq!(result.probability_of_balanced, 0.0);
        assert!(result.sum_histogram.is_empty());
    }

    #[test]
    fn test_invalid_game_size() {
        let pool = PoolConfig::mega_sena();
        let mut rng = StdRng::seed_from_u64(1);
        let err = run_simulation(10, None, 21, &BalanceBands::default(), &pool, &mut rng);
        assert!(matches!(err, Err(EngineError::GameSize { size: 21, .. })));
        assert!(run_parallel(10, 1, None, 5, &BalanceBands::default(), &pool).is_err());
    }

    #[test]
    fn test_game_size_checked_without_trials() {
        let pool = PoolConfig::lotofacil();
        assert!(check_game_size(15, &pool).is_ok());
        assert!(check_game_size(20, &pool).is_ok());
        assert!(matches!(
            check_game_size(6, &pool),
            Err(EngineError::GameSize { size: 6, min: 15, max: 20 })
        ));

        let mut rng = StdRng::seed_from_u64(1);
        let err = run_simulation(0, None, 21, &BalanceBands::default(), &pool, &mut rng);
        assert!(matches!(err, Err(EngineError::GameSize { size: 21, .. })));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let pool = PoolConfig::mega_sena();
        let bands = BalanceBands::default();
        let reference = [5, 12, 23, 34, 45, 56];
        let a = run_simulation(
            500,
            Some(&reference),
            6,
            &bands,
            &pool,
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        let b = run_simulation(
            500,
            Some(&reference),
            6,
            &bands,
            &pool,
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_is_reproducible() {
        let pool = PoolConfig::mega_sena();
        let bands = BalanceBands::default();
        let a = run_parallel(25_000, 99, None, 6, &bands, &pool).unwrap();
        let b = run_parallel(25_000, 99, None, 6, &bands, &pool).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.trials, 25_000);
        assert_eq!(a.frame_histogram.iter().sum::<u64>(), 25_000);

        // chunks are plain sequential runs seeded seed, seed + 1, ...
        let mut expected = SimulationResult::empty(6);
        for (chunk, len) in [(0u64, CHUNK_TRIALS), (1, CHUNK_TRIALS), (2, 5_000)] {
            let mut rng = StdRng::seed_from_u64(99 + chunk);
            let part = run_simulation(len, None, 6, &bands, &pool, &mut rng).unwrap();
            expected.merge(&part);
        }
        assert_eq!(a, expected);
    }

    #[test]
    fn test_merge() {
        let pool = PoolConfig::mega_sena();
        let bands = BalanceBands::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut a = run_simulation(300, None, 6, &bands, &pool, &mut rng).unwrap();
        let b = run_simulation(200, None, 6, &bands, &pool, &mut rng).unwrap();
        let balanced = a.balanced_trials + b.balanced_trials;
        a.merge(&b);
        assert_eq!(a.trials, 500);
        assert_eq!(a.balanced_trials, balanced);
        assert!((a.probability_of_balanced - balanced as f64 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_proportional_bands() {
        let mega = BalanceBands::proportional(&PoolConfig::mega_sena(), 6);
        assert_eq!(mega.repeats, (0, 1));
        assert_eq!(mega.even, (2, 4));
        assert_eq!(mega.frame, (2, 3));
        assert_eq!(mega.prime, (1, 2));
        assert_eq!(mega.min_rows, 4);

        let pool = PoolConfig::lotofacil();
        let bands = BalanceBands::proportional(&pool, 15);
        // 15 of 25 against a 15-number draw overlaps 9 on average
        assert_eq!(bands.repeats, (6, 12));
        assert_eq!(bands.even, (5, 10));
        assert_eq!(bands.sum, (98, 253));
        assert_eq!(bands.min_rows, 5);

        let mut rng = StdRng::seed_from_u64(8);
        let result = run_simulation(1_000, None, 15, &bands, &pool, &mut rng).unwrap();
        assert_eq!(result.frame_histogram.len(), 16);
        assert!(result.balanced_trials > 0);
    }
}
