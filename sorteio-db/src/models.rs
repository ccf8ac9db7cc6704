use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One historical draw. `sequence` is the contest number, strictly increasing
/// across the history; `numbers` holds the k drawn numbers in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub sequence: u32,
    pub date: String,
    pub numbers: Vec<u8>,
}

impl DrawRecord {
    pub fn new(sequence: u32, date: impl Into<String>, mut numbers: Vec<u8>) -> Self {
        numbers.sort_unstable();
        Self {
            sequence,
            date: date.into(),
            numbers,
        }
    }

    pub fn contains(&self, number: u8) -> bool {
        self.numbers.binary_search(&number).is_ok()
    }
}

/// Static description of a lottery: pool size, draw arity, allowed game sizes,
/// the grid printed on the betting slip and the number classes used by the
/// scoring rules. Everything the engine needs about "the game" lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub pool_size: u8,
    pub draw_size: usize,
    pub min_per_game: usize,
    pub max_per_game: usize,
    pub grid_columns: u8,
    pub frame: Vec<u8>,
    pub primes: Vec<u8>,
    pub fibonacci: Vec<u8>,
    pub base_price: f64,
}

impl PoolConfig {
    /// Builds a pool with frame/prime/Fibonacci sets derived from the grid and the range.
    pub fn new(
        name: impl Into<String>,
        pool_size: u8,
        draw_size: usize,
        min_per_game: usize,
        max_per_game: usize,
        grid_columns: u8,
        base_price: f64,
    ) -> Self {
        let grid_columns = grid_columns.max(1);
        Self {
            name: name.into(),
            pool_size,
            draw_size,
            min_per_game,
            max_per_game,
            grid_columns,
            frame: border_cells(pool_size, grid_columns),
            primes: primes_up_to(pool_size),
            fibonacci: fibonacci_up_to(pool_size),
            base_price,
        }
    }

    pub fn mega_sena() -> Self {
        Self::new("mega-sena", 60, 6, 6, 20, 10, 5.0)
    }

    pub fn lotofacil() -> Self {
        Self::new("lotofacil", 25, 15, 15, 20, 5, 3.0)
    }

    pub fn numbers(&self) -> std::ops::RangeInclusive<u8> {
        1..=self.pool_size
    }

    pub fn contains(&self, number: u8) -> bool {
        number >= 1 && number <= self.pool_size
    }

    pub fn is_frame(&self, number: u8) -> bool {
        self.frame.contains(&number)
    }

    pub fn is_prime(&self, number: u8) -> bool {
        self.primes.contains(&number)
    }

    pub fn is_fibonacci(&self, number: u8) -> bool {
        self.fibonacci.contains(&number)
    }

    pub fn grid_rows(&self) -> u8 {
        self.pool_size.div_ceil(self.grid_columns)
    }

    /// 1-based grid row of `number`.
    pub fn row_of(&self, number: u8) -> u8 {
        number.div_ceil(self.grid_columns)
    }

    /// 1-based grid column of `number`.
    pub fn column_of(&self, number: u8) -> u8 {
        (number.saturating_sub(1)) % self.grid_columns + 1
    }

    /// Mean of the numbers in the pool, (N+1)/2.
    pub fn average(&self) -> f64 {
        (self.pool_size as f64 + 1.0) / 2.0
    }

    pub fn range(&self) -> f64 {
        self.pool_size.saturating_sub(1) as f64
    }

    /// Price of one game of `game_size` numbers: every k-subset it contains is one simple bet.
    pub fn price(&self, game_size: usize) -> Option<f64> {
        if game_size < self.min_per_game || game_size > self.max_per_game {
            return None;
        }
        Some(binomial(game_size, self.draw_size) as f64 * self.base_price)
    }

    /// Rejects pools the grid and game arithmetic cannot handle, e.g. one read back from JSON.
    pub fn validate(&self) -> Result<()> {
        if self.grid_columns == 0 {
            bail!("Volante de {} sem colunas", self.name);
        }
        if self.draw_size == 0 || self.draw_size > self.pool_size as usize {
            bail!(
                "Sorteio de {} números impossível em 1-{}",
                self.draw_size,
                self.pool_size
            );
        }
        if self.min_per_game > self.max_per_game || self.max_per_game > self.pool_size as usize {
            bail!(
                "Tamanho de jogo inválido ({}-{}) para 1-{}",
                self.min_per_game,
                self.max_per_game,
                self.pool_size
            );
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::mega_sena()
    }
}

pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result = 1u64;
    for i in 0..k {
        result = result * (n - i) as u64 / (i as u64 + 1);
    }
    result
}

fn border_cells(pool_size: u8, columns: u8) -> Vec<u8> {
    let rows = pool_size.div_ceil(columns);
    (1..=pool_size)
        .filter(|&n| {
            let row = n.div_ceil(columns);
            let col = (n - 1) % columns + 1;
            row == 1 || row == rows || col == 1 || col == columns
        })
        .collect()
}

fn primes_up_to(limit: u8) -> Vec<u8> {
    let limit = limit as usize;
    let mut sieve = vec![true; limit + 1];
    let mut primes = Vec::new();
    for n in 2..=limit {
        if sieve[n] {
            primes.push(n as u8);
            let mut m = n * n;
            while m <= limit {
                sieve[m] = false;
                m += n;
            }
        }
    }
    primes
}

fn fibonacci_up_to(limit: u8) -> Vec<u8> {
    let mut fib = Vec::new();
    let (mut a, mut b) = (1u16, 2u16);
    while a <= limit as u16 {
        fib.push(a as u8);
        let next = a + b;
        a = b;
        b = next;
    }
    fib
}

/// Checks arity, range and uniqueness. The engine assumes draws passed this check.
pub fn validate_draw(numbers: &[u8], pool: &PoolConfig) -> Result<()> {
    if numbers.len() != pool.draw_size {
        bail!(
            "{} números esperados para {}, recebidos {}",
            pool.draw_size,
            pool.name,
            numbers.len()
        );
    }
    for &n in numbers {
        if !pool.contains(n) {
            bail!("Número {} fora do intervalo (1-{})", n, pool.pool_size);
        }
    }
    for i in 0..numbers.len() {
        for j in (i + 1)..numbers.len() {
            if numbers[i] == numbers[j] {
                bail!("Número repetido: {}", numbers[i]);
            }
        }
    }
    Ok(())
}
