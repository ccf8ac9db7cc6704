pub mod config;
pub mod cooccurrence;
pub mod cycles;
pub mod error;
pub mod game;
pub mod generator;
pub mod montecarlo;
pub mod quality;
pub mod stats;
pub mod wheel;

pub use error::{EngineError, Result};
pub use game::Game;

#[cfg(test)]
use sorteio_db::models::{DrawRecord, PoolConfig};

/// Deterministic history of `n` draws in ascending sequence order, spread over the whole pool.
#[cfg(test)]
pub(crate) fn make_test_draws(n: usize, pool: &PoolConfig) -> Vec<DrawRecord> {
    let size = pool.pool_size as usize;
    let step = (size / pool.draw_size.max(1)).max(1);
    (0..n)
        .map(|i| {
            let numbers = (0..pool.draw_size)
                .map(|j| ((i * 7 + j * step) % size + 1) as u8)
                .collect();
            DrawRecord::new(
                i as u32 + 1,
                format!("{:02}/{:02}/2024", (i % 28) + 1, (i % 12) + 1),
                numbers,
            )
        })
        .collect()
}
