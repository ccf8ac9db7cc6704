use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::import::ImportResult;
use sorteio_db::models::DrawRecord;
use sorteio_engine::cooccurrence::PairStat;
use sorteio_engine::cycles::NumberCycleStat;
use sorteio_engine::generator::GeneratedGame;
use sorteio_engine::montecarlo::SimulationResult;
use sorteio_engine::quality::QualityScore;
use sorteio_engine::wheel::{ReplaySummary, VerificationResult, WheelResult};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:02}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

fn score_color(score: u32) -> Color {
    if score >= 80 {
        Color::Green
    } else if score >= 50 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Urgency is never negative, only overdue numbers stand out.
fn urgency_color(urgency: f64) -> Color {
    if urgency >= 1.0 {
        Color::Red
    } else {
        Color::White
    }
}

fn frequency_color(z: f64) -> Color {
    if z >= 1.0 {
        Color::Green
    } else if z <= -1.0 {
        Color::Blue
    } else {
        Color::White
    }
}

pub fn display_draws(draws: &[DrawRecord]) {
    if draws.is_empty() {
        println!("Nenhum sorteio para exibir.");
        return;
    }

    let mut table = new_table(vec!["Concurso", "Data", "Dezenas"]);
    for draw in draws {
        table.add_row(vec![
            draw.sequence.to_string(),
            draw.date.clone(),
            join_numbers(&draw.numbers),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Importação concluída:");
    println!("  Linhas lidas         : {}", result.total_records);
    println!("  Inseridos           : {}", result.inserted);
    println!("  Duplicatas ignoradas: {}", result.skipped);
    if result.errors > 0 {
        println!("  Erros               : {}", result.errors);
    }
}

pub fn display_cycles(stats: &[&NumberCycleStat], total_draws: usize) {
    println!("\nCiclos em {} sorteios\n", total_draws);

    let mut table = new_table(vec![
        "Dezena", "Saídas", "Última", "Atual", "Média", "Desvio", "P(fechar)", "Urgência",
        "Freq z", "Score",
    ]);
    for stat in stats {
        table.add_row(vec![
            Cell::new(format!("{:02}", stat.number)),
            Cell::new(stat.appearances),
            Cell::new(stat.last_seen.map_or("-".to_string(), |s| s.to_string())),
            Cell::new(stat.current_cycle),
            Cell::new(format!("{:.2}", stat.mean)),
            Cell::new(format!("{:.2}", stat.stddev)),
            Cell::new(format!("{:.2}", stat.close_probability)),
            Cell::new(format!("{:+.2}", stat.urgency)).fg(urgency_color(stat.urgency)),
            Cell::new(format!("{:+.2}", stat.frequency_z)).fg(frequency_color(stat.frequency_z)),
            Cell::new(format!("{:+.3}", stat.weighted_score)),
        ]);
    }
    println!("{table}");
}

pub fn display_pairs(pairs: &[PairStat], total_draws: usize) {
    println!("\nPares mais frequentes em {} sorteios\n", total_draws);

    let mut table = new_table(vec!["Par", "Juntos", "Phi"]);
    for pair in pairs {
        table.add_row(vec![
            format!("{:02} - {:02}", pair.a, pair.b),
            pair.count.to_string(),
            format!("{:+.4}", pair.phi),
        ]);
    }
    println!("{table}");
}

pub fn display_generated(games: &[(GeneratedGame, QualityScore)], requested: usize) {
    println!("\nJogos gerados ({}/{})\n", games.len(), requested);

    let mut table = new_table(vec!["#", "Dezenas", "Score médio", "Qualidade", "Violações"]);
    for (i, (generated, quality)) in games.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(generated.game.to_string()),
            Cell::new(format!("{:+.3}", generated.average_score)),
            Cell::new(quality.score).fg(score_color(quality.score)),
            Cell::new(quality.violations.join("; ")),
        ]);
    }
    println!("{table}");
}

pub fn display_score(numbers: &[u8], result: &QualityScore) {
    let m = &result.metrics;
    println!("\nJogo {}\n", join_numbers(numbers));

    let mut table = new_table(vec!["Métrica", "Valor"]);
    table.add_row(vec!["Soma".to_string(), m.sum.to_string()]);
    table.add_row(vec!["Pares / ímpares".to_string(), format!("{} / {}", m.even_count, m.odd_count)]);
    table.add_row(vec!["Moldura".to_string(), m.frame_count.to_string()]);
    table.add_row(vec!["Primos".to_string(), m.prime_count.to_string()]);
    table.add_row(vec!["Fibonacci".to_string(), m.fibonacci_count.to_string()]);
    table.add_row(vec!["Amplitude".to_string(), m.amplitude.to_string()]);
    table.add_row(vec![
        "Sequências de 2 / 3".to_string(),
        format!("{} / {}", m.consecutive_pairs, m.consecutive_trios),
    ]);
    table.add_row(vec!["Maior sequência".to_string(), m.longest_run.to_string()]);
    table.add_row(vec!["Linhas".to_string(), format!("{:?}", m.row_counts)]);
    table.add_row(vec!["Colunas".to_string(), format!("{:?}", m.column_counts)]);
    if let Some(repeats) = m.repeats {
        table.add_row(vec!["Repetidas do último sorteio".to_string(), repeats.to_string()]);
    }
    println!("{table}");

    let color = score_color(result.score);
    let mut summary = new_table(vec!["Nota", "Violações"]);
    summary.add_row(vec![
        Cell::new(result.score).fg(color),
        Cell::new(if result.violations.is_empty() {
            "nenhuma".to_string()
        } else {
            result.violations.join("\n")
        }),
    ]);
    println!("{summary}");
}

pub fn display_wheel(result: &WheelResult) {
    println!(
        "\nDesdobramento {:?}: {} jogos, {:.1}% de cobertura, alvo {} acertos\n",
        result.strategy, result.total_games, result.coverage_percent, result.guaranteed_hits
    );

    let mut table = new_table(vec!["#", "Dezenas"]);
    for (i, game) in result.games.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), game.to_string()]);
    }
    println!("{table}");

    println!(
        "Custo: {} x {:.2} = {:.2}",
        result.total_games, result.cost_per_game, result.total_cost
    );
    if let Some(average) = result.average_hits_per_game {
        println!("Acertos aproximados por jogo: {:.1}", average);
    }
}

pub fn display_verification(result: &VerificationResult) {
    let mut table = new_table(vec!["Jogo", "Acertos"]);
    for (i, hits) in result.hits.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), hits.to_string()]);
    }
    println!("{table}");

    let verdict = if result.guarantee_achieved {
        Cell::new("atingido").fg(Color::Green)
    } else {
        Cell::new("não atingido").fg(Color::Red)
    };
    let mut summary = new_table(vec!["Melhor", "Pior", "Média", "Alvo"]);
    summary.add_row(vec![
        Cell::new(result.best),
        Cell::new(result.worst),
        Cell::new(format!("{:.2}", result.average)),
        verdict,
    ]);
    println!("{summary}");
}

pub fn display_replay(summary: &ReplaySummary, guaranteed_hits: usize) {
    println!(
        "\nConferência histórica: {} de {} sorteios atingiram {} acertos ({:.2}%)\n",
        summary.achieved,
        summary.draws_checked,
        guaranteed_hits,
        summary.achieved_rate * 100.0
    );

    let mut table = new_table(vec!["Melhor acerto", "Sorteios"]);
    for (hits, count) in summary.best_hits.iter().rev() {
        let cell = Cell::new(hits);
        let cell = if *hits >= guaranteed_hits {
            cell.fg(Color::Green)
        } else {
            cell
        };
        table.add_row(vec![cell, Cell::new(count)]);
    }
    println!("{table}");
}

fn histogram_table(label: &str, histogram: &[u64], trials: usize) -> Table {
    let mut table = new_table(vec![label, "Simulações", "%"]);
    for (count, &n) in histogram.iter().enumerate() {
        if n == 0 {
            continue;
        }
        table.add_row(vec![
            count.to_string(),
            n.to_string(),
            format!("{:.2}", n as f64 / trials.max(1) as f64 * 100.0),
        ]);
    }
    table
}

pub fn display_simulation(result: &SimulationResult) {
    println!(
        "\n{} jogos aleatórios de {}: {} equilibrados ({:.3}%)\n",
        result.trials,
        result.game_size,
        result.balanced_trials,
        result.probability_of_balanced * 100.0
    );

    println!("{}", histogram_table("Moldura", &result.frame_histogram, result.trials));
    println!("{}", histogram_table("Primos", &result.prime_histogram, result.trials));
    println!("{}", histogram_table("Fibonacci", &result.fibonacci_histogram, result.trials));

    if let (Some((&lo, _)), Some((&hi, _))) = (
        result.sum_histogram.first_key_value(),
        result.sum_histogram.last_key_value(),
    ) {
        let total: u64 = result.sum_histogram.values().sum();
        let weighted: u64 = result
            .sum_histogram
            .iter()
            .map(|(&sum, &n)| sum as u64 * n)
            .sum();
        println!(
            "Soma: mín {}, máx {}, média {:.1}",
            lo,
            hi,
            weighted as f64 / total.max(1) as f64
        );
    }
}
