use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sorteio_db::models::PoolConfig;

use crate::cycles::CycleConfig;
use crate::generator::SamplingConfig;
use crate::montecarlo::BalanceBands;
use crate::quality::QualityRules;

/// Every tunable constant of the engine, grouped by component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub cycles: CycleConfig,
    pub quality: QualityRules,
    pub sampling: SamplingConfig,
    pub balance: BalanceBands,
}

impl EngineConfig {
    /// Defaults for `pool`, with balance bands rescaled to its draw size.
    pub fn for_pool(pool: PoolConfig) -> Self {
        let balance = if pool == PoolConfig::mega_sena() {
            BalanceBands::default()
        } else {
            BalanceBands::proportional(&pool, pool.draw_size)
        };
        Self {
            pool,
            balance,
            ..Self::default()
        }
    }
}

pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossível gravar {}", path.display()))?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossível ler {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuração inválida em {}", path.display()))?;
    config
        .pool
        .validate()
        .with_context(|| format!("Loteria inválida em {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_config() {
        let path = std::env::temp_dir().join(format!("sorteio_config_{}.json", std::process::id()));
        let mut config = EngineConfig::for_pool(PoolConfig::lotofacil());
        config.cycles.close_window = 7;
        config.quality.sum_penalty = 30;

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "cycles": { "close_window": 3, "urgency_weight": 0.5, "frequency_weight": 0.5 } }"#)
                .unwrap();
        assert_eq!(config.cycles.close_window, 3);
        assert_eq!(config.pool, PoolConfig::mega_sena());
        assert_eq!(config.quality, QualityRules::default());
    }

    #[test]
    fn test_for_pool() {
        let mega = EngineConfig::for_pool(PoolConfig::mega_sena());
        assert_eq!(mega, EngineConfig::default());

        let loto = EngineConfig::for_pool(PoolConfig::lotofacil());
        assert_eq!(loto.pool.pool_size, 25);
        assert_eq!(loto.balance.repeats, (6, 12));
    }

    #[test]
    fn test_load_rejects_pool_without_columns() {
        let path = std::env::temp_dir().join(format!("sorteio_no_columns_{}.json", std::process::id()));
        let mut config = EngineConfig::default();
        config.pool.grid_columns = 0;

        save_config(&config, &path).unwrap();
        let result = load_config(&path);
        std::fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("sem colunas"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/sorteio.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sorteio.json"));
    }
}
