use std::collections::HashSet;

use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use sorteio_db::models::PoolConfig;

use crate::cycles::{CycleTable, ScoreKind};
use crate::error::{EngineError, Result};
use crate::game::Game;

/// Inclusive bounds; either side may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl Bounds {
    pub fn new(min: Option<u32>, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub fn between(min: u32, max: u32) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn contains(&self, value: u32) -> bool {
        self.min.is_none_or(|lo| value >= lo) && self.max.is_none_or(|hi| value <= hi)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameFilters {
    pub even: Bounds,
    pub sum: Bounds,
    pub frame: Bounds,
}

impl GameFilters {
    pub fn accepts(&self, game: &Game, pool: &PoolConfig) -> bool {
        self.even.contains(game.even_count() as u32)
            && self.sum.contains(game.sum())
            && self.frame.contains(game.frame_count(pool) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Weight floor so zero or negative scores stay selectable.
    pub epsilon: f64,
    /// Smallest sampling pool, before the `2 x game_size` rule.
    pub min_pool: usize,
    /// Attempt budget per requested game.
    pub attempts_per_game: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            min_pool: 15,
            attempts_per_game: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub game_size: usize,
    pub top_n: usize,
    pub score: ScoreKind,
    pub filters: GameFilters,
    pub num_games: usize,
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedGame {
    pub game: Game,
    pub average_score: f64,
}

/// Top `top_n` numbers by score, padded down the ranking up to `max(2 x game_size, min_pool)`.
pub fn sampling_pool(stats: &CycleTable, config: &GeneratorConfig) -> Vec<(u8, f64)> {
    let ranked = stats.ranked_by(config.score);
    let floor = (2 * config.game_size).max(config.sampling.min_pool);
    let take = config.top_n.max(floor).min(ranked.len());
    ranked
        .into_iter()
        .take(take)
        .map(|s| (s.number, s.score(config.score)))
        .collect()
}

/// Draws `count` numbers without replacement, each pick proportional to its floored score.
fn sample_without_replacement<R: Rng + ?Sized>(
    candidates: &[(u8, f64)],
    count: usize,
    epsilon: f64,
    rng: &mut R,
) -> Result<(Vec<u8>, f64)> {
    let mut available: Vec<(u8, f64)> = candidates.to_vec();
    let mut selected = Vec::with_capacity(count);
    let mut score_total = 0.0f64;

    for _ in 0..count {
        let weights: Vec<f64> = available.iter().map(|(_, s)| s.max(epsilon)).collect();
        let dist = WeightedIndex::new(&weights)?;
        let idx = dist.sample(rng);

        let (number, score) = available.remove(idx);
        selected.push(number);
        score_total += score;
    }

    let average = if count > 0 { score_total / count as f64 } else { 0.0 };
    Ok((selected, average))
}

/// Weighted game generation over the cycle scores.
///
/// Returns at most `num_games` distinct games passing the filters. When the
/// attempt budget runs out first the partial batch is returned as is; callers
/// compare the length against what they asked for.
pub fn generate_games<R: Rng + ?Sized>(
    stats: &CycleTable,
    pool: &PoolConfig,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Vec<GeneratedGame>> {
    if config.game_size < pool.min_per_game || config.game_size > pool.max_per_game {
        return Err(EngineError::GameSize {
            size: config.game_size,
            min: pool.min_per_game,
            max: pool.max_per_game,
        });
    }

    let candidates = sampling_pool(stats, config);
    if candidates.len() < config.game_size {
        return Err(EngineError::InsufficientPool {
            available: candidates.len(),
            needed: config.game_size,
        });
    }

    let max_attempts = config.num_games * config.sampling.attempts_per_game;
    let mut games = Vec::with_capacity(config.num_games);
    let mut seen: HashSet<Game> = HashSet::new();
    let mut attempts = 0usize;

    while games.len() < config.num_games && attempts < max_attempts {
        attempts += 1;
        let (numbers, average_score) = sample_without_replacement(
            &candidates,
            config.game_size,
            config.sampling.epsilon,
            rng,
        )?;
        let game = Game::from_distinct(numbers);

        if !config.filters.accepts(&game, pool) || seen.contains(&game) {
            continue;
        }
        seen.insert(game.clone());
        games.push(GeneratedGame {
            game,
            average_score,
        });
    }

    if games.len() < config.num_games {
        log::warn!(
            "generator stopped after {} attempts with {}/{} games",
            attempts,
            games.len(),
            config.num_games
        );
    } else {
        log::debug!(
            "generated {} games from a pool of {} in {} attempts",
            games.len(),
            candidates.len(),
            attempts
        );
    }

    Ok(games)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::{compute_cycle_stats, CycleConfig, NumberCycleStat};
    use crate::make_test_draws;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mock_stat(number: u8, urgency: f64) -> NumberCycleStat {
        NumberCycleStat {
            number,
            appearances: 0,
            last_seen: None,
            historical_cycles: vec![],
            current_cycle: 0,
            mean: 0.0,
            stddev: 0.0,
            close_probability: 0.0,
            frequency: 0.0,
            frequency_z: 0.0,
            urgency,
            weighted_score: urgency,
        }
    }

    fn config(game_size: usize, num_games: usize) -> GeneratorConfig {
        GeneratorConfig {
            game_size,
            top_n: 60,
            score: ScoreKind::Urgency,
            filters: GameFilters::default(),
            num_games,
            sampling: SamplingConfig::default(),
        }
    }

    fn real_table(pool: &PoolConfig) -> CycleTable {
        compute_cycle_stats(&make_test_draws(150, pool), pool, &CycleConfig::default())
    }

    #[test]
    fn test_high_urgency_selected_more_often() {
        let pool = PoolConfig::mega_sena();
        let stats: Vec<NumberCycleStat> = (1..=60u8)
            .map(|n| match n {
                1 => mock_stat(1, 10.0),
                2 => mock_stat(2, 0.1),
                _ => mock_stat(n, 1.0),
            })
            .collect();
        let table = CycleTable::from_stats(stats, 0);
        let mut rng = StdRng::seed_from_u64(42);

        let games = generate_games(&table, &pool, &config(6, 1000), &mut rng).unwrap();
        assert_eq!(games.len(), 1000);
        let count = |n: u8| games.iter().filter(|g| g.game.contains(n)).count();
        assert!(count(1) > count(2), "1: {}, 2: {}", count(1), count(2));
    }

    #[test]
    fn test_sum_filter_respected() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let mut cfg = config(6, 50);
        cfg.filters.sum = Bounds::between(150, 200);
        let mut rng = StdRng::seed_from_u64(7);

        let games = generate_games(&table, &pool, &cfg, &mut rng).unwrap();
        assert!(!games.is_empty());
        for g in &games {
            let sum = g.game.sum();
            assert!((150..=200).contains(&sum), "sum {sum} outside filter");
        }
    }

    #[test]
    fn test_even_and_frame_filters_respected() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let mut cfg = config(6, 30);
        cfg.filters.even = Bounds::between(3, 3);
        cfg.filters.frame = Bounds::new(None, Some(2));
        let mut rng = StdRng::seed_from_u64(11);

        let games = generate_games(&table, &pool, &cfg, &mut rng).unwrap();
        for g in &games {
            assert_eq!(g.game.even_count(), 3);
            assert!(g.game.frame_count(&pool) <= 2);
        }
    }

    #[test]
    fn test_no_duplicate_games_or_numbers() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let mut rng = StdRng::seed_from_u64(3);

        let games = generate_games(&table, &pool, &config(8, 200), &mut rng).unwrap();
        let unique: HashSet<&Game> = games.iter().map(|g| &g.game).collect();
        assert_eq!(unique.len(), games.len());
        for g in &games {
            assert_eq!(g.game.len(), 8);
            assert!(g.game.numbers().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_impossible_filter_returns_partial_batch() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let mut cfg = config(6, 5);
        cfg.filters.sum = Bounds::between(0, 10);
        let mut rng = StdRng::seed_from_u64(1);

        let games = generate_games(&table, &pool, &cfg, &mut rng).unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn test_game_size_out_of_range() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate_games(&table, &pool, &config(5, 1), &mut rng).unwrap_err();
        assert_eq!(err, EngineError::GameSize { size: 5, min: 6, max: 20 });
        assert!(generate_games(&table, &pool, &config(21, 1), &mut rng).is_err());
    }

    #[test]
    fn test_small_top_n_padded_from_ranking() {
        let pool = PoolConfig::mega_sena();
        let stats: Vec<NumberCycleStat> = (1..=60u8).map(|n| mock_stat(n, n as f64)).collect();
        let table = CycleTable::from_stats(stats, 0);
        let mut cfg = config(6, 20);
        cfg.top_n = 3;

        let candidates = sampling_pool(&table, &cfg);
        assert_eq!(candidates.len(), 15);
        assert!(candidates.iter().all(|&(n, _)| n >= 46));

        let mut rng = StdRng::seed_from_u64(5);
        let games = generate_games(&table, &pool, &cfg, &mut rng).unwrap();
        for g in &games {
            assert!(g.game.numbers().iter().all(|&n| n >= 46));
        }
    }

    #[test]
    fn test_negative_scores_remain_selectable() {
        let pool = PoolConfig::mega_sena();
        let stats: Vec<NumberCycleStat> = (1..=60u8).map(|n| mock_stat(n, -1.0)).collect();
        let table = CycleTable::from_stats(stats, 0);
        let mut rng = StdRng::seed_from_u64(9);
        let games = generate_games(&table, &pool, &config(6, 10), &mut rng).unwrap();
        assert_eq!(games.len(), 10);
        assert!(games.iter().all(|g| (g.average_score + 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_seed_determinism() {
        let pool = PoolConfig::mega_sena();
        let table = real_table(&pool);
        let a = generate_games(&table, &pool, &config(6, 10), &mut StdRng::seed_from_u64(123)).unwrap();
        let b = generate_games(&table, &pool, &config(6, 10), &mut StdRng::seed_from_u64(123)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bounds_contains() {
        assert!(Bounds::default().contains(0));
        assert!(Bounds::new(Some(3), None).contains(100));
        assert!(!Bounds::new(Some(3), None).contains(2));
        assert!(!Bounds::new(None, Some(3)).contains(4));
        assert!(Bounds::between(2, 4).contains(4));
    }
}
