use anyhow::{Context, Result};
use chrono::NaiveDate;
use sorteio_db::rusqlite::Connection;
use std::path::Path;

use sorteio_db::db::insert_draw;
use sorteio_db::models::{validate_draw, DrawRecord, PoolConfig};

/// `DD/MM/YYYY` as printed by the lottery, stored as `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%d/%m/%Y")
        .with_context(|| format!("Data inválida '{}' (esperado DD/MM/AAAA)", raw))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn field(record: &csv::StringRecord, idx: usize) -> Result<&str> {
    record
        .get(idx)
        .map(str::trim)
        .with_context(|| format!("Campo ausente no índice {}", idx))
}

fn parse_record(record: &csv::StringRecord, pool: &PoolConfig) -> Result<DrawRecord> {
    let get = |idx: usize| field(record, idx);

    let raw_sequence = get(0)?;
    let sequence: u32 = raw_sequence
        .parse()
        .with_context(|| format!("Número de concurso inválido '{}'", raw_sequence))?;
    let date = parse_date(get(1)?)?;

    let mut numbers = Vec::with_capacity(pool.draw_size);
    for idx in 2..2 + pool.draw_size {
        let s = get(idx)?;
        let n = s
            .parse::<u8>()
            .with_context(|| format!("Impossível interpretar '{}' (índice {})", s, idx))?;
        numbers.push(n);
    }
    validate_draw(&numbers, pool)?;

    Ok(DrawRecord::new(sequence, date, numbers))
}

fn is_header(record: &csv::StringRecord) -> bool {
    record
        .get(0)
        .is_some_and(|field| field.trim().parse::<u32>().is_err())
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

/// Loads `contest;date;n1;...;nk` rows. Bad rows are counted, never fatal.
pub fn import_csv(conn: &Connection, path: &Path, pool: &PoolConfig) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossível abrir {:?}", path))?;

    let tx = conn
        .unchecked_transaction()
        .context("Impossível iniciar a transação")?;

    let mut result = ImportResult::default();

    for (line, record_result) in reader.records().enumerate() {
        match record_result {
            Ok(record) => {
                if line == 0 && is_header(&record) {
                    continue;
                }
                result.total_records += 1;
                match parse_record(&record, pool) {
                    Ok(draw) => match insert_draw(&tx, &draw) {
                        Ok(true) => result.inserted += 1,
                        Ok(false) => result.skipped += 1,
                        Err(e) => {
                            log::warn!("Falha na inserção do concurso {}: {}", draw.sequence, e);
                            result.errors += 1;
                        }
                    },
                    Err(e) => {
                        log::warn!("Linha {}: {:#}", line + 1, e);
                        result.errors += 1;
                    }
                }
            }
            Err(e) => {
                result.total_records += 1;
                log::warn!("Linha {}: {}", line + 1, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Falha no commit")?;
    log::info!(
        "imported {} draws from {:?} ({} duplicates, {} errors)",
        result.inserted,
        path,
        result.skipped,
        result.errors
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorteio_db::db::{count_draws, fetch_all_draws, migrate};

    fn temp_csv(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sorteio_{}_{}.csv", name, std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("17/02/2026").unwrap(), "2026-02-17");
        assert_eq!(parse_date(" 01/01/2020 ").unwrap(), "2020-01-01");
        assert!(parse_date("2020-01-01").is_err());
        assert!(parse_date("31/02/2020").is_err());
    }

    #[test]
    fn test_parse_record() {
        let pool = PoolConfig::mega_sena();
        let record = csv::StringRecord::from(vec!["2790", "10/10/2024", "41", "4", "17", "29", "34", "51"]);
        let draw = parse_record(&record, &pool).unwrap();
        assert_eq!(draw.sequence, 2790);
        assert_eq!(draw.date, "2024-10-10");
        assert_eq!(draw.numbers, vec![4, 17, 29, 34, 41, 51]);

        let short = csv::StringRecord::from(vec!["2791", "12/10/2024", "1", "2", "3"]);
        assert!(parse_record(&short, &pool).is_err());

        let out_of_range = csv::StringRecord::from(vec!["2792", "15/10/2024", "1", "2", "3", "4", "5", "61"]);
        assert!(parse_record(&out_of_range, &pool).is_err());

        let duplicate = csv::StringRecord::from(vec!["2793", "17/10/2024", "1", "2", "3", "4", "5", "5"]);
        assert!(parse_record(&duplicate, &pool).is_err());
    }

    #[test]
    fn test_import_counts_rows() {
        let pool = PoolConfig::mega_sena();
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let path = temp_csv(
            "import",
            "Concurso;Data;B1;B2;B3;B4;B5;B6\n\
             2;18/03/1996;9;37;39;41;43;49\n\
             1;11/03/1996;4;5;30;33;41;52\n\
             2;18/03/1996;9;37;39;41;43;49\n\
             3;25/03/1996;10;11;29;30;36;99\n\
             4;01/04/1996;1;5;6;27;42;59\n",
        );
        let result = import_csv(&conn, &path, &pool).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            result,
            ImportResult {
                total_records: 5,
                inserted: 3,
                skipped: 1,
                errors: 1,
            }
        );
        assert_eq!(count_draws(&conn).unwrap(), 3);
        let sequences: Vec<u32> = fetch_all_draws(&conn).unwrap().iter().map(|d| d.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 4]);
    }

    #[test]
    fn test_import_lotofacil_without_header() {
        let pool = PoolConfig::lotofacil();
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let path = temp_csv(
            "lotofacil",
            "1;29/09/2003;2;3;5;6;9;10;11;13;14;16;18;20;23;24;25\n",
        );
        let result = import_csv(&conn, &path, &pool).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(result.inserted, 1);
        assert_eq!(result.errors, 0);
        assert_eq!(fetch_all_draws(&conn).unwrap()[0].numbers.len(), 15);
    }
}
