//! Wheels ("fechamentos"): bounded sets of games built from a larger pool of
//! numbers, aiming at a minimum number of hits whatever subset is drawn.
//!
//! None of the strategies below proves its guarantee. `guaranteed_hits` is only
//! the requested target and is echoed back unverified; `verify_hits` and
//! `replay_wheel` measure what a wheel actually achieves against real or
//! simulated draws.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use sorteio_db::models::{DrawRecord, PoolConfig};

use crate::error::{EngineError, Result};
use crate::game::Game;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelStrategy {
    #[default]
    Balanced,
    Coverage,
    Optimized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelConfig {
    pub available: Vec<u8>,
    pub fixed: Vec<u8>,
    pub game_size: usize,
    pub guaranteed_hits: usize,
    pub max_games: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelResult {
    pub strategy: WheelStrategy,
    pub games: Vec<Game>,
    pub total_games: usize,
    pub total_cost: f64,
    pub cost_per_game: f64,
    pub coverage_percent: f64,
    /// Requested, never verified by the generator.
    pub guaranteed_hits: usize,
    /// Only the balanced strategy reports it, as the rough `game_size / 2`.
    pub average_hits_per_game: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub hits: Vec<usize>,
    pub best: usize,
    pub worst: usize,
    pub average: f64,
    pub guarantee_achieved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub draws_checked: usize,
    pub achieved: usize,
    pub achieved_rate: f64,
    /// Best hit count of the wheel per draw -> number of draws.
    pub best_hits: BTreeMap<usize, usize>,
}

/// Validated split of the configuration into fixed and variable numbers.
struct Plan {
    available: Vec<u8>,
    fixed: Vec<u8>,
    variable: Vec<u8>,
    needed: usize,
}

fn plan(config: &WheelConfig, pool: &PoolConfig) -> Result<Plan> {
    if config.game_size < pool.min_per_game || config.game_size > pool.max_per_game {
        return Err(EngineError::GameSize {
            size: config.game_size,
            min: pool.min_per_game,
            max: pool.max_per_game,
        });
    }
    if config.guaranteed_hits < 1 || config.guaranteed_hits > config.game_size {
        return Err(EngineError::GuaranteedHits {
            hits: config.guaranteed_hits,
            game_size: config.game_size,
        });
    }
    if config.max_games == 0 {
        return Err(EngineError::MaxGames);
    }

    let mut available = BTreeSet::new();
    for &n in &config.available {
        if !pool.contains(n) {
            return Err(EngineError::NumberOutOfRange {
                number: n,
                pool_size: pool.pool_size,
            });
        }
        if !available.insert(n) {
            return Err(EngineError::DuplicateNumber(n));
        }
    }

    let mut fixed = BTreeSet::new();
    for &n in &config.fixed {
        if !available.contains(&n) {
            return Err(EngineError::FixedNotAvailable(n));
        }
        if !fixed.insert(n) {
            return Err(EngineError::DuplicateNumber(n));
        }
    }
    if fixed.len() > config.game_size {
        return Err(EngineError::TooManyFixed {
            fixed: fixed.len(),
            game_size: config.game_size,
        });
    }

    let variable: Vec<u8> = available.difference(&fixed).copied().collect();
    let needed = config.game_size - fixed.len();
    if variable.len() < needed {
        return Err(EngineError::InsufficientPool {
            available: variable.len(),
            needed,
        });
    }

    Ok(Plan {
        available: available.into_iter().collect(),
        fixed: fixed.into_iter().collect(),
        variable,
        needed,
    })
}

impl Plan {
    fn game_with(&self, slice: impl IntoIterator<Item = u8>) -> Game {
        let mut numbers = self.fixed.clone();
        numbers.extend(slice);
        Game::from_distinct(numbers)
    }

    /// Tops `block` up to `needed` numbers, walking `order` from the start.
    fn backfill(&self, block: &mut Vec<u8>, order: &[u8]) {
        for &n in order {
            if block.len() >= self.needed {
                break;
            }
            if !block.contains(&n) {
                block.push(n);
            }
        }
    }
}

/// Deals one shuffle of the variable pool round-robin into `ceil(pool / open slots)` games.
fn balanced<R: Rng + ?Sized>(plan: &Plan, max_games: usize, rng: &mut R) -> Vec<Game> {
    if plan.needed == 0 {
        return vec![plan.game_with([])];
    }
    let mut shuffled = plan.variable.clone();
    shuffled.shuffle(rng);

    let count = shuffled.len().div_ceil(plan.needed).min(max_games);
    let mut hands: Vec<Vec<u8>> = vec![Vec::with_capacity(plan.needed); count];
    for (i, &n) in shuffled.iter().enumerate() {
        let hand = &mut hands[i % count];
        if hand.len() < plan.needed {
            hand.push(n);
        }
    }

    hands
        .into_iter()
        .map(|mut hand| {
            plan.backfill(&mut hand, &shuffled);
            plan.game_with(hand)
        })
        .collect()
}

/// Favors the least used numbers, with a random share for diversity, until every
/// number has been played often enough or `max_games` is reached.
fn coverage<R: Rng + ?Sized>(
    plan: &Plan,
    guaranteed_hits: usize,
    max_games: usize,
    rng: &mut R,
) -> Vec<Game> {
    if plan.needed == 0 {
        return vec![plan.game_with([])];
    }
    let target = guaranteed_hits.div_ceil(2) as u32;
    let min_games = target.max(3) as usize;
    let least_used_slots = ((plan.needed as f64) * 0.7).ceil() as usize;

    let mut usage: BTreeMap<u8, u32> = plan.variable.iter().map(|&n| (n, 0)).collect();
    let mut games: Vec<Game> = Vec::new();
    let mut seen: HashSet<Game> = HashSet::new();
    let mut attempts = 0usize;

    while games.len() < max_games && attempts < max_games * 10 {
        attempts += 1;

        let mut order = plan.variable.clone();
        order.shuffle(rng);
        order.sort_by_key(|n| usage[n]);

        let mut slice: Vec<u8> = order.iter().take(least_used_slots).copied().collect();
        let mut rest: Vec<u8> = order[least_used_slots.min(order.len())..].to_vec();
        rest.shuffle(rng);
        slice.extend(rest.into_iter().take(plan.needed - slice.len()));

        let game = plan.game_with(slice.iter().copied());
        if !seen.insert(game.clone()) {
            continue;
        }
        for n in &slice {
            if let Some(count) = usage.get_mut(n) {
                *count += 1;
            }
        }
        games.push(game);

        if games.len() >= min_games && usage.values().all(|&c| c >= target) {
            break;
        }
    }

    if games.len() < max_games && !usage.values().all(|&c| c >= target) {
        log::warn!(
            "coverage wheel stopped after {} attempts with {} games",
            attempts,
            games.len()
        );
    }
    games
}

/// Cuts one shuffle of the variable pool into contiguous blocks, wrapping to fill the last one.
fn optimized<R: Rng + ?Sized>(plan: &Plan, max_games: usize, rng: &mut R) -> Vec<Game> {
    if plan.needed == 0 {
        return vec![plan.game_with([])];
    }
    if plan.variable.len() <= plan.needed {
        return vec![plan.game_with(plan.variable.iter().copied())];
    }
    let mut shuffled = plan.variable.clone();
    shuffled.shuffle(rng);

    let count = shuffled.len().div_ceil(plan.needed).min(max_games);
    (0..count)
        .map(|b| {
            let start = b * plan.needed;
            let end = (start + plan.needed).min(shuffled.len());
            let mut block = shuffled[start..end].to_vec();
            plan.backfill(&mut block, &shuffled);
            plan.game_with(block)
        })
        .collect()
}

/// Builds a wheel with the chosen strategy. Fails before any work on an invalid
/// configuration; otherwise may return fewer games than `max_games`.
pub fn generate_wheel<R: Rng + ?Sized>(
    config: &WheelConfig,
    strategy: WheelStrategy,
    pool: &PoolConfig,
    rng: &mut R,
) -> Result<WheelResult> {
    let plan = plan(config, pool)?;

    let games = match strategy {
        WheelStrategy::Balanced => balanced(&plan, config.max_games, rng),
        WheelStrategy::Coverage => coverage(&plan, config.guaranteed_hits, config.max_games, rng),
        WheelStrategy::Optimized => optimized(&plan, config.max_games, rng),
    };

    let used: BTreeSet<u8> = games.iter().flat_map(|g| g.numbers().iter().copied()).collect();
    let coverage_percent = if plan.available.is_empty() {
        0.0
    } else {
        used.len() as f64 / plan.available.len() as f64 * 100.0
    };

    let cost_per_game = pool.price(config.game_size).unwrap_or(0.0);
    let total_games = games.len();

    log::debug!(
        "{:?} wheel: {} games, {:.1}% coverage",
        strategy,
        total_games,
        coverage_percent
    );

    Ok(WheelResult {
        strategy,
        games,
        total_games,
        total_cost: cost_per_game * total_games as f64,
        cost_per_game,
        coverage_percent,
        guaranteed_hits: config.guaranteed_hits,
        average_hits_per_game: match strategy {
            WheelStrategy::Balanced => Some(config.game_size as f64 / 2.0),
            _ => None,
        },
    })
}

/// Hit counts of every game against one draw.
pub fn verify_hits(games: &[Game], draw: &[u8], guaranteed_hits: usize) -> VerificationResult {
    let hits: Vec<usize> = games.iter().map(|g| g.hits(draw)).collect();
    let best = hits.iter().copied().max().unwrap_or(0);
    let worst = hits.iter().copied().min().unwrap_or(0);
    let average = if hits.is_empty() {
        0.0
    } else {
        hits.iter().sum::<usize>() as f64 / hits.len() as f64
    };

    VerificationResult {
        hits,
        best,
        worst,
        average,
        guarantee_achieved: best >= guaranteed_hits,
    }
}

/// Runs `verify_hits` against every historical draw.
pub fn replay_wheel(games: &[Game], draws: &[DrawRecord], guaranteed_hits: usize) -> ReplaySummary {
    let mut best_hits = BTreeMap::new();
    let mut achieved = 0usize;
    for draw in draws {
        let result = verify_hits(games, &draw.numbers, guaranteed_hits);
        if result.guarantee_achieved {
            achieved += 1;
        }
        *best_hits.entry(result.best).or_insert(0) += 1;
    }

    log::info!(
        "replayed {} games over {} draws: target reached {} times",
        games.len(),
        draws.len(),
        achieved
    );

    ReplaySummary {
        draws_checked: draws.len(),
        achieved,
        achieved_rate: if draws.is_empty() {
            0.0
        } else {
            achieved as f64 / draws.len() as f64
        },
        best_hits,
    }
}
