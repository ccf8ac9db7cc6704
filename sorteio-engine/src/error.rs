use thiserror::Error;

/// Errors raised before any generation work starts. Running out of attempts is
/// never an error: generators return the games they managed to build.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("game size {size} outside allowed range {min}..={max}")]
    GameSize { size: usize, min: usize, max: usize },
    #[error("guaranteed hits {hits} outside allowed range 1..={game_size}")]
    GuaranteedHits { hits: usize, game_size: usize },
    #[error("fixed number {0} is not part of the available numbers")]
    FixedNotAvailable(u8),
    #[error("{fixed} fixed numbers do not fit in a game of {game_size}")]
    TooManyFixed { fixed: usize, game_size: usize },
    #[error("max games must be at least 1")]
    MaxGames,
    #[error("number {number} outside pool 1..={pool_size}")]
    NumberOutOfRange { number: u8, pool_size: u8 },
    #[error("number {0} appears more than once")]
    DuplicateNumber(u8),
    #[error("pool of {available} numbers cannot fill the {needed} open slots of a game")]
    InsufficientPool { available: usize, needed: usize },
    #[error("weighted sampling failed: {0}")]
    Sampling(#[from] rand::distr::weighted::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
