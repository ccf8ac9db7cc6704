use serde::{Deserialize, Serialize};

use sorteio_db::models::PoolConfig;

use crate::game::Game;

/// Thresholds and penalties of the quality heuristic. Fractions are of the
/// game size unless noted. Tuned for Mega-Sena (N=60, k=6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRules {
    pub max_run_cap: usize,
    pub run_penalty: u32,
    pub even_range: (f64, f64),
    pub even_penalty: u32,
    /// Fractions of `m x pool average`.
    pub sum_range: (f64, f64),
    pub sum_penalty: u32,
    pub frame_range: (f64, f64),
    pub frame_penalty: u32,
    pub prime_range: (f64, f64),
    pub prime_penalty: u32,
    pub max_fibonacci: f64,
    pub fibonacci_penalty: u32,
    pub max_per_row: usize,
    pub row_penalty: u32,
    pub max_per_column: usize,
    pub column_penalty: u32,
    /// Fraction of the pool range (N-1).
    pub min_amplitude: f64,
    pub amplitude_penalty: u32,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            max_run_cap: 5,
            run_penalty: 25,
            even_range: (0.30, 0.70),
            even_penalty: 20,
            sum_range: (0.50, 1.30),
            sum_penalty: 20,
            frame_range: (0.20, 0.55),
            frame_penalty: 15,
            prime_range: (0.15, 0.45),
            prime_penalty: 12,
            max_fibonacci: 0.30,
            fibonacci_penalty: 8,
            max_per_row: 3,
            row_penalty: 8,
            max_per_column: 2,
            column_penalty: 8,
            min_amplitude: 0.35,
            amplitude_penalty: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub size: usize,
    pub sum: u32,
    pub even_count: usize,
    pub odd_count: usize,
    pub frame_count: usize,
    pub prime_count: usize,
    pub fibonacci_count: usize,
    pub amplitude: u8,
    pub longest_run: usize,
    pub consecutive_pairs: usize,
    pub consecutive_trios: usize,
    /// Index 0 is row 1.
    pub row_counts: Vec<usize>,
    /// Index 0 is column 1.
    pub column_counts: Vec<usize>,
    /// Numbers shared with the reference draw, when one was given.
    pub repeats: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: u32,
    pub violations: Vec<String>,
    pub metrics: QualityMetrics,
}

fn outside(value: f64, (lo, hi): (f64, f64)) -> bool {
    value < lo || value > hi
}

fn fraction(count: usize, size: usize) -> f64 {
    if size == 0 {
        return 0.0;
    }
    count as f64 / size as f64
}

/// Informational metrics, independent of the rules.
pub fn game_metrics(game: &Game, pool: &PoolConfig, reference: Option<&[u8]>) -> QualityMetrics {
    let numbers = game.numbers();
    let mut row_counts = vec![0usize; pool.grid_rows() as usize];
    let mut column_counts = vec![0usize; pool.grid_columns as usize];
    for &n in numbers {
        if let Some(c) = row_counts.get_mut(pool.row_of(n) as usize - 1) {
            *c += 1;
        }
        if let Some(c) = column_counts.get_mut(pool.column_of(n) as usize - 1) {
            *c += 1;
        }
    }

    let consecutive_pairs = numbers.windows(2).filter(|w| w[1] == w[0] + 1).count();
    let consecutive_trios = numbers
        .windows(3)
        .filter(|w| w[1] == w[0] + 1 && w[2] == w[1] + 1)
        .count();
    let even_count = game.even_count();

    QualityMetrics {
        size: numbers.len(),
        sum: game.sum(),
        even_count,
        odd_count: numbers.len() - even_count,
        frame_count: game.frame_count(pool),
        prime_count: game.prime_count(pool),
        fibonacci_count: game.fibonacci_count(pool),
        amplitude: game.amplitude(),
        longest_run: game.longest_run(),
        consecutive_pairs,
        consecutive_trios,
        row_counts,
        column_counts,
        repeats: reference.map(|draw| game.hits(draw)),
    }
}

/// Scores a game from 100 down, one fixed penalty per broken rule, floored at 0.
/// Depends only on the set of numbers, never on history.
pub fn score_game(
    game: &Game,
    pool: &PoolConfig,
    rules: &QualityRules,
    reference: Option<&[u8]>,
) -> QualityScore {
    let metrics = game_metrics(game, pool, reference);
    let m = metrics.size;
    let mut penalty = 0u32;
    let mut violations = Vec::new();

    let mut check = |triggered: bool, weight: u32, message: String| {
        if triggered {
            penalty += weight;
            violations.push(message);
        }
    };

    // Below four numbers m-2 would flag any single number as a run.
    let run_limit = m.saturating_sub(2).min(rules.max_run_cap).max(2);
    check(
        metrics.longest_run >= run_limit,
        rules.run_penalty,
        format!("sequência de {} dezenas consecutivas", metrics.longest_run),
    );

    let even = fraction(metrics.even_count, m);
    check(
        outside(even, rules.even_range),
        rules.even_penalty,
        format!("{} pares em {}", metrics.even_count, m),
    );

    let expected_sum = m as f64 * pool.average();
    let sum_bounds = (
        expected_sum * rules.sum_range.0,
        expected_sum * rules.sum_range.1,
    );
    check(
        outside(metrics.sum as f64, sum_bounds),
        rules.sum_penalty,
        format!(
            "soma {} fora de {:.0}..={:.0}",
            metrics.sum, sum_bounds.0, sum_bounds.1
        ),
    );

    check(
        outside(fraction(metrics.frame_count, m), rules.frame_range),
        rules.frame_penalty,
        format!("{} dezenas na moldura em {}", metrics.frame_count, m),
    );

    check(
        outside(fraction(metrics.prime_count, m), rules.prime_range),
        rules.prime_penalty,
        format!("{} primos em {}", metrics.prime_count, m),
    );

    check(
        fraction(metrics.fibonacci_count, m) > rules.max_fibonacci,
        rules.fibonacci_penalty,
        format!("{} dezenas de Fibonacci em {}", metrics.fibonacci_count, m),
    );

    let row_limit = m.min(rules.max_per_row);
    if let Some((row, &count)) = metrics
        .row_counts
        .iter()
        .enumerate()
        .find(|&(_, &c)| c > row_limit)
    {
        check(
            true,
            rules.row_penalty,
            format!("{} dezenas na linha {} (limite {})", count, row + 1, row_limit),
        );
    }

    let column_limit = m.min(rules.max_per_column);
    let crowded_columns = metrics
        .column_counts
        .iter()
        .filter(|&&c| c > column_limit)
        .count();
    check(
        crowded_columns >= 2,
        rules.column_penalty,
        format!("{} colunas com mais de {} dezenas", crowded_columns, column_limit),
    );

    let min_amplitude = pool.range() * rules.min_amplitude;
    check(
        (metrics.amplitude as f64) < min_amplitude,
        rules.amplitude_penalty,
        format!("amplitude {} abaixo de {:.0}", metrics.amplitude, min_amplitude),
    );

    QualityScore {
        score: 100u32.saturating_sub(penalty),
        violations,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(numbers: &[u8]) -> Game {
        Game::new(numbers.to_vec(), &PoolConfig::mega_sena()).unwrap()
    }

    #[test]
    fn test_well_spread_game_is_clean() {
        let pool = PoolConfig::mega_sena();
        // sum 180, 2 even, 2 frame (4, 51), 2 primes (17, 29), 1 Fibonacci (34)
        let result = score_game(&game(&[4, 17, 29, 34, 45, 51]), &pool, &QualityRules::default(), None);
        assert_eq!(result.violations, Vec::<String>::new());
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_sequence_game_penalized() {
        let pool = PoolConfig::mega_sena();
        let result = score_game(&game(&[1, 2, 3, 4, 5, 6]), &pool, &QualityRules::default(), None);
        // run, sum, frame (all six on row 1), primes, fibonacci, row, amplitude
        assert_eq!(result.score, 100 - 25 - 20 - 15 - 12 - 8 - 8 - 10);
        assert_eq!(result.violations.len(), 7);
        assert_eq!(result.metrics.consecutive_pairs, 5);
        assert_eq!(result.metrics.consecutive_trios, 4);
        assert_eq!(result.metrics.longest_run, 6);
    }

    #[test]
    fn test_score_never_negative() {
        let pool = PoolConfig::mega_sena();
        let rules = QualityRules {
            run_penalty: 90,
            sum_penalty: 90,
            ..QualityRules::default()
        };
        let result = score_game(&game(&[1, 2, 3, 4, 5, 6]), &pool, &rules, None);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_order_independent() {
        let pool = PoolConfig::mega_sena();
        let rules = QualityRules::default();
        let sorted = vec![3, 11, 12, 13, 40, 58];
        let mut reversed = sorted.clone();
        reversed.reverse();
        let a = score_game(&game(&sorted), &pool, &rules, None);
        let b = score_game(&game(&reversed), &pool, &rules, None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_column_rule_needs_two_crowded_columns() {
        let pool = PoolConfig::mega_sena();
        let rules = QualityRules::default();
        // column 1 holds three numbers, everything else spread
        let one = score_game(&game(&[1, 11, 21, 34, 47, 58]), &pool, &rules, None);
        assert!(!one.violations.iter().any(|v| v.contains("colunas")));
        // columns 1 and 2 hold three numbers each
        let two = score_game(&game(&[1, 2, 11, 12, 21, 22]), &pool, &rules, None);
        assert!(two.violations.iter().any(|v| v.contains("colunas")));
    }

    #[test]
    fn test_row_counts_and_columns() {
        let pool = PoolConfig::mega_sena();
        let metrics = game_metrics(&game(&[1, 10, 11, 25, 59, 60]), &pool, None);
        assert_eq!(metrics.row_counts, vec![2, 1, 1, 0, 0, 2]);
        assert_eq!(metrics.column_counts[0], 2);
        assert_eq!(metrics.column_counts[9], 2);
        assert_eq!(metrics.column_counts[4], 1);
        assert_eq!(metrics.consecutive_pairs, 2);
        assert_eq!(metrics.consecutive_trios, 0);
    }

    #[test]
    fn test_repeats_against_reference() {
        let pool = PoolConfig::mega_sena();
        let reference = [4, 17, 20, 30, 40, 50];
        let metrics = game_metrics(&game(&[4, 17, 29, 34, 45, 51]), &pool, Some(&reference));
        assert_eq!(metrics.repeats, Some(2));
        assert_eq!(game_metrics(&game(&[4, 17, 29, 34, 45, 51]), &pool, None).repeats, None);
    }

    #[test]
    fn test_narrow_amplitude() {
        let pool = PoolConfig::mega_sena();
        let result = score_game(&game(&[20, 22, 25, 29, 31, 38]), &pool, &QualityRules::default(), None);
        assert!(result.violations.iter().any(|v| v.starts_with("amplitude")));
    }
}
