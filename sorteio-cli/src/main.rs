mod display;
mod import;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use sorteio_db::db::{
    count_draws, db_path, fetch_all_draws, fetch_draw, fetch_last_draws, insert_draw, migrate,
    open_db,
};
use sorteio_db::models::{validate_draw, DrawRecord, PoolConfig};
use sorteio_db::rusqlite::Connection;
use sorteio_engine::config::{load_config, save_config, EngineConfig};
use sorteio_engine::cooccurrence::compute_cooccurrence;
use sorteio_engine::cycles::{compute_cycle_stats, ScoreKind};
use sorteio_engine::generator::{generate_games, Bounds, GameFilters, GeneratorConfig};
use sorteio_engine::montecarlo::{
    check_game_size, run_parallel, run_simulation, BalanceBands, SimulationResult,
};
use sorteio_engine::quality::score_game;
use sorteio_engine::wheel::{generate_wheel, replay_wheel, verify_hits, WheelConfig, WheelStrategy};
use sorteio_engine::Game;

use crate::display::{
    display_cycles, display_draws, display_generated, display_import_summary, display_pairs,
    display_replay, display_score, display_simulation, display_verification, display_wheel,
};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
enum Lottery {
    #[default]
    MegaSena,
    Lotofacil,
}

impl Lottery {
    fn pool(self) -> PoolConfig {
        match self {
            Lottery::MegaSena => PoolConfig::mega_sena(),
            Lottery::Lotofacil => PoolConfig::lotofacil(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum RankBy {
    Urgency,
    #[default]
    Weighted,
}

impl From<RankBy> for ScoreKind {
    fn from(value: RankBy) -> Self {
        match value {
            RankBy::Urgency => ScoreKind::Urgency,
            RankBy::Weighted => ScoreKind::Weighted,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Strategy {
    #[default]
    Balanced,
    Coverage,
    Optimized,
}

impl From<Strategy> for WheelStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Balanced => WheelStrategy::Balanced,
            Strategy::Coverage => WheelStrategy::Coverage,
            Strategy::Optimized => WheelStrategy::Optimized,
        }
    }
}

/// `min:max`, either side optional.
fn parse_bounds(raw: &str) -> Result<Bounds, String> {
    let (lo, hi) = raw
        .split_once(':')
        .ok_or_else(|| format!("esperado min:max, recebido '{raw}'"))?;
    let side = |s: &str| -> Result<Option<u32>, String> {
        let s = s.trim();
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse().map(Some).map_err(|_| format!("limite inválido '{s}'"))
        }
    };
    Ok(Bounds::new(side(lo)?, side(hi)?))
}

#[derive(Parser)]
#[command(name = "sorteio", about = "Análise de ciclos, geração de jogos e desdobramentos para as loterias")]
struct Cli {
    /// Loteria analisada
    #[arg(short, long, global = true, value_enum, default_value = "mega-sena")]
    game: Lottery,

    /// Arquivo JSON de parâmetros do motor (ver init-config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importar sorteios de um CSV `concurso;DD/MM/AAAA;n1;...;nk`
    Import {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Listar os últimos sorteios
    List {
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Adicionar um sorteio manualmente
    Add {
        contest: u32,
        /// DD/MM/AAAA
        date: String,
        #[arg(required = true)]
        numbers: Vec<u8>,
    },

    /// Estatísticas de ciclo por dezena
    Cycles {
        #[arg(short, long, default_value = "15")]
        top: usize,

        #[arg(long, value_enum, default_value = "weighted")]
        by: RankBy,

        /// Ordenar pelo atraso atual
        #[arg(long)]
        overdue: bool,
    },

    /// Pares sorteados juntos com mais frequência
    Pairs {
        #[arg(short, long, default_value = "20")]
        top: usize,
    },

    /// Gerar jogos ponderados pelos scores de ciclo
    Generate {
        #[arg(short, long, default_value = "5")]
        count: usize,

        /// Dezenas por jogo (padrão: tamanho do sorteio)
        #[arg(short, long)]
        size: Option<usize>,

        #[arg(long, default_value = "20")]
        top_n: usize,

        #[arg(long, value_enum, default_value = "urgency")]
        by: RankBy,

        /// Quantidade de pares, min:max
        #[arg(long, value_parser = parse_bounds)]
        even: Option<Bounds>,

        /// Soma, min:max
        #[arg(long, value_parser = parse_bounds)]
        sum: Option<Bounds>,

        /// Dezenas na moldura, min:max
        #[arg(long, value_parser = parse_bounds)]
        frame: Option<Bounds>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Nota de qualidade de um jogo
    Score {
        #[arg(required = true)]
        numbers: Vec<u8>,
    },

    /// Montar um desdobramento a partir de um conjunto de dezenas
    Wheel {
        #[arg(short, long, value_delimiter = ',', required = true)]
        numbers: Vec<u8>,

        /// Dezenas presentes em todos os jogos
        #[arg(short, long, value_delimiter = ',')]
        fixed: Vec<u8>,

        #[arg(short, long)]
        size: Option<usize>,

        /// Acertos garantidos
        #[arg(long, default_value = "4")]
        hits: usize,

        #[arg(short, long, default_value = "10")]
        max_games: usize,

        #[arg(long, value_enum, default_value = "balanced")]
        strategy: Strategy,

        #[arg(long)]
        seed: Option<u64>,

        /// Conferir o desdobramento contra todos os sorteios
        #[arg(long)]
        replay: bool,
    },

    /// Acertos de um jogo contra um sorteio
    Verify {
        #[arg(short, long, value_delimiter = ',', required = true)]
        numbers: Vec<u8>,

        #[arg(short, long, value_delimiter = ',', conflicts_with = "contest", required_unless_present = "contest")]
        draw: Vec<u8>,

        /// Usar um concurso armazenado em vez de --draw
        #[arg(long)]
        contest: Option<u32>,

        #[arg(long, default_value = "4")]
        hits: usize,
    },

    /// Referência Monte Carlo de jogos equilibrados ao acaso
    Simulate {
        #[arg(short, long, default_value = "100000")]
        trials: usize,

        #[arg(short, long)]
        size: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Distribuir as simulações em todos os núcleos
        #[arg(long)]
        parallel: bool,
    },

    /// Mostrar o caminho da base de dados
    DbPath,

    /// Gravar os parâmetros padrão do motor em um JSON
    InitConfig {
        #[arg(short, long, default_value = "sorteio.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = engine_config(cli.game, cli.config.as_deref())?;
    let path = db_path(&config.pool.name);
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file, &config),
        Command::List { last } => cmd_list(&conn, last),
        Command::Add {
            contest,
            date,
            numbers,
        } => cmd_add(&conn, &config, contest, &date, numbers),
        Command::Cycles { top, by, overdue } => cmd_cycles(&conn, &config, top, by, overdue),
        Command::Pairs { top } => cmd_pairs(&conn, &config, top),
        Command::Generate {
            count,
            size,
            top_n,
            by,
            even,
            sum,
            frame,
            seed,
        } => {
            let filters = GameFilters {
                even: even.unwrap_or_default(),
                sum: sum.unwrap_or_default(),
                frame: frame.unwrap_or_default(),
            };
            let generator = GeneratorConfig {
                game_size: size.unwrap_or(config.pool.draw_size),
                top_n,
                score: by.into(),
                filters,
                num_games: count,
                sampling: config.sampling,
            };
            cmd_generate(&conn, &config, &generator, seed)
        }
        Command::Score { numbers } => cmd_score(&conn, &config, numbers),
        Command::Wheel {
            numbers,
            fixed,
            size,
            hits,
            max_games,
            strategy,
            seed,
            replay,
        } => {
            let wheel = WheelConfig {
                available: numbers,
                fixed,
                game_size: size.unwrap_or(config.pool.draw_size),
                guaranteed_hits: hits,
                max_games,
            };
            cmd_wheel(&conn, &config, &wheel, strategy.into(), seed, replay)
        }
        Command::Verify {
            numbers,
            draw,
            contest,
            hits,
        } => cmd_verify(&conn, &config, numbers, draw, contest, hits),
        Command::Simulate {
            trials,
            size,
            seed,
            parallel,
        } => cmd_simulate(&conn, &config, trials, size, seed, parallel),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::InitConfig { output } => {
            save_config(&config, &output)?;
            println!("Parâmetros gravados em {}", output.display());
            Ok(())
        }
    }
}

fn engine_config(lottery: Lottery, path: Option<&Path>) -> Result<EngineConfig> {
    let pool = lottery.pool();
    let Some(path) = path else {
        return Ok(EngineConfig::for_pool(pool));
    };
    let config = load_config(path)?;
    if config.pool.name != pool.name {
        bail!(
            "{} está configurado para {}, não {}",
            path.display(),
            config.pool.name,
            pool.name
        );
    }
    Ok(config)
}

/// Today's date as YYYYMMDD.
fn date_seed() -> u64 {
    let today = chrono::Local::now().date_naive();
    let y = today.year() as u64;
    let m = today.month() as u64;
    let d = today.day() as u64;
    y * 10_000 + m * 100 + d
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(date_seed)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = resolve_seed(seed);
    println!("Semente: {seed}");
    StdRng::seed_from_u64(seed)
}

fn load_history(conn: &Connection, lottery: &str) -> Result<Option<Vec<DrawRecord>>> {
    if count_draws(conn)? == 0 {
        println!("Base vazia. Execute antes: sorteio --game {lottery} import --file <csv>");
        return Ok(None);
    }
    Ok(Some(fetch_all_draws(conn)?))
}

fn last_draw(conn: &Connection) -> Result<Option<DrawRecord>> {
    Ok(fetch_last_draws(conn, 1)?.into_iter().next())
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )
        .expect("static progress template")
        .progress_chars("=> "),
    );
    pb
}

fn cmd_import(conn: &Connection, file: &Path, config: &EngineConfig) -> Result<()> {
    let result = import::import_csv(conn, file, &config.pool)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_add(
    conn: &Connection,
    config: &EngineConfig,
    contest: u32,
    date: &str,
    numbers: Vec<u8>,
) -> Result<()> {
    let date = import::parse_date(date)?;
    validate_draw(&numbers, &config.pool)?;
    let draw = DrawRecord::new(contest, date, numbers);

    if insert_draw(conn, &draw)? {
        display_draws(std::slice::from_ref(&draw));
        println!("Sorteio inserido.");
    } else {
        println!("Concurso {} já armazenado (duplicata ignorada).", contest);
    }
    Ok(())
}

fn cmd_cycles(
    conn: &Connection,
    config: &EngineConfig,
    top: usize,
    by: RankBy,
    overdue: bool,
) -> Result<()> {
    let Some(draws) = load_history(conn, &config.pool.name)? else {
        return Ok(());
    };
    let table = compute_cycle_stats(&draws, &config.pool, &config.cycles);

    let ranked = if overdue {
        table.most_overdue(top)
    } else {
        let mut ranked = table.ranked_by(by.into());
        ranked.truncate(top);
        ranked
    };
    display_cycles(&ranked, table.total_draws);
    Ok(())
}

fn cmd_pairs(conn: &Connection, config: &EngineConfig, top: usize) -> Result<()> {
    let Some(draws) = load_history(conn, &config.pool.name)? else {
        return Ok(());
    };
    let stats = compute_cooccurrence(&draws, &config.pool);
    display_pairs(&stats.top_pairs(top), stats.total_draws);
    Ok(())
}

fn cmd_generate(
    conn: &Connection,
    config: &EngineConfig,
    generator: &GeneratorConfig,
    seed: Option<u64>,
) -> Result<()> {
    let Some(draws) = load_history(conn, &config.pool.name)? else {
        return Ok(());
    };
    let table = compute_cycle_stats(&draws, &config.pool, &config.cycles);
    let reference = draws.last().map(|d| d.numbers.as_slice());

    let mut rng = seeded_rng(seed);
    let games = generate_games(&table, &config.pool, generator, &mut rng)?;
    if games.len() < generator.num_games {
        println!(
            "Apenas {} de {} jogos passaram pelos filtros.",
            games.len(),
            generator.num_games
        );
    }

    let scored: Vec<_> = games
        .into_iter()
        .map(|g| {
            let quality = score_game(&g.game, &config.pool, &config.quality, reference);
            (g, quality)
        })
        .collect();
    display_generated(&scored, generator.num_games);
    Ok(())
}

fn cmd_score(conn: &Connection, config: &EngineConfig, numbers: Vec<u8>) -> Result<()> {
    let game = Game::new(numbers, &config.pool)?;
    let reference = last_draw(conn)?;
    let result = score_game(
        &game,
        &config.pool,
        &config.quality,
        reference.as_ref().map(|d| d.numbers.as_slice()),
    );
    display_score(game.numbers(), &result);
    Ok(())
}

fn cmd_wheel(
    conn: &Connection,
    config: &EngineConfig,
    wheel: &WheelConfig,
    strategy: WheelStrategy,
    seed: Option<u64>,
    replay: bool,
) -> Result<()> {
    let mut rng = seeded_rng(seed);
    let result = generate_wheel(wheel, strategy, &config.pool, &mut rng)?;
    display_wheel(&result);

    if replay {
        let Some(draws) = load_history(conn, &config.pool.name)? else {
            return Ok(());
        };
        let pb = ProgressBar::new_spinner();
        pb.set_message(format!("Conferindo {} sorteios...", draws.len()));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        let summary = replay_wheel(&result.games, &draws, wheel.guaranteed_hits);
        pb.finish_and_clear();
        display_replay(&summary, wheel.guaranteed_hits);
    }
    Ok(())
}

fn cmd_verify(
    conn: &Connection,
    config: &EngineConfig,
    numbers: Vec<u8>,
    draw: Vec<u8>,
    contest: Option<u32>,
    hits: usize,
) -> Result<()> {
    let game = Game::new(numbers, &config.pool)?;
    let draw = match contest {
        Some(contest) => fetch_draw(conn, contest)?
            .with_context(|| format!("Concurso {} não encontrado", contest))?
            .numbers,
        None => {
            validate_draw(&draw, &config.pool)?;
            draw
        }
    };

    println!("Jogo {} contra o sorteio {:?}", game, draw);
    let result = verify_hits(std::slice::from_ref(&game), &draw, hits);
    display_verification(&result);
    Ok(())
}

fn cmd_simulate(
    conn: &Connection,
    config: &EngineConfig,
    trials: usize,
    size: Option<usize>,
    seed: Option<u64>,
    parallel: bool,
) -> Result<()> {
    const STEP: usize = 10_000;

    let game_size = size.unwrap_or(config.pool.draw_size);
    check_game_size(game_size, &config.pool)?;
    let bands = if game_size == config.pool.draw_size {
        config.balance.clone()
    } else {
        BalanceBands::proportional(&config.pool, game_size)
    };
    let reference = last_draw(conn)?;
    let reference = reference.as_ref().map(|d| d.numbers.as_slice());

    let result = if parallel {
        let seed = resolve_seed(seed);
        println!("Semente: {seed}");
        run_parallel(trials, seed, reference, game_size, &bands, &config.pool)?
    } else {
        let mut rng = seeded_rng(seed);
        let pb = progress_bar(trials as u64);
        let mut result = SimulationResult::empty(game_size);
        let mut done = 0;
        while done < trials {
            let batch = STEP.min(trials - done);
            let part = run_simulation(batch, reference, game_size, &bands, &config.pool, &mut rng)?;
            result.merge(&part);
            done += batch;
            pb.inc(batch as u64);
        }
        pb.finish_and_clear();
        result
    };

    display_simulation(&result);
    Ok(())
}
