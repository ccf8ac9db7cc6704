use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::models::DrawRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    sequence  INTEGER PRIMARY KEY,
    date      TEXT NOT NULL,
    numbers   TEXT NOT NULL
);
";

/// One database file per lottery, under `./data`.
pub fn db_path(lottery: &str) -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push(format!("{lottery}.db"));
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossível criar o diretório {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossível abrir a base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("Falha na migração")?;
    Ok(())
}

fn encode_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_numbers(raw: &str) -> Result<Vec<u8>> {
    raw.split_whitespace()
        .map(|s| {
            s.parse::<u8>()
                .with_context(|| format!("Dezena corrompida '{}' no sorteio armazenado", s))
        })
        .collect()
}

/// Returns `false` when the sequence number is already stored.
pub fn insert_draw(conn: &Connection, draw: &DrawRecord) -> Result<bool> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO draws (sequence, date, numbers) VALUES (?1, ?2, ?3)",
            rusqlite::params![draw.sequence, draw.date, encode_numbers(&draw.numbers)],
        )
        .context("Falha na inserção")?;
    Ok(changed > 0)
}

fn query_draws(conn: &Connection, sql: &str, limit: u32) -> Result<Vec<DrawRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(sequence, date, raw)| Ok(DrawRecord::new(sequence, date, decode_numbers(&raw)?)))
        .collect()
}

/// Full history in ascending sequence order, as the analyzers expect it.
pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<DrawRecord>> {
    query_draws(
        conn,
        "SELECT sequence, date, numbers FROM draws ORDER BY sequence ASC LIMIT ?1",
        u32::MAX,
    )
}

/// Most recent draws first.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<DrawRecord>> {
    query_draws(
        conn,
        "SELECT sequence, date, numbers FROM draws ORDER BY sequence DESC LIMIT ?1",
        limit,
    )
}

pub fn fetch_draw(conn: &Connection, sequence: u32) -> Result<Option<DrawRecord>> {
    let draws = query_draws(
        conn,
        "SELECT sequence, date, numbers FROM draws WHERE sequence = ?1",
        sequence,
    )?;
    Ok(draws.into_iter().next())
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_draw(sequence: u32, date: &str) -> DrawRecord {
        DrawRecord::new(sequence, date, vec![4, 8, 15, 16, 23, 42])
    }

    #[test]
    fn test_insert_and_count() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 0);

        insert_draw(&conn, &test_draw(1, "2024-01-01")).unwrap();
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let inserted = insert_draw(&conn, &test_draw(1, "2024-01-01")).unwrap();
        assert!(inserted);
        let inserted = insert_draw(&conn, &test_draw(1, "2024-01-01")).unwrap();
        assert!(!inserted);
        assert_eq!(count_draws(&conn).unwrap(), 1);
    }

    #[test]
    fn test_fetch_order() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        insert_draw(&conn, &test_draw(1, "2024-01-01")).unwrap();
        insert_draw(&conn, &test_draw(3, "2024-01-05")).unwrap();
        insert_draw(&conn, &test_draw(2, "2024-01-03")).unwrap();

        let last = fetch_last_draws(&conn, 10).unwrap();
        assert_eq!(last.iter().map(|d| d.sequence).collect::<Vec<_>>(), vec![3, 2, 1]);

        let all = fetch_all_draws(&conn).unwrap();
        assert_eq!(all.iter().map(|d| d.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(all[0].numbers, vec![4, 8, 15, 16, 23, 42]);
    }

    #[test]
    fn test_fetch_single_draw() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        insert_draw(&conn, &test_draw(7, "2024-02-01")).unwrap();

        assert_eq!(fetch_draw(&conn, 7).unwrap().map(|d| d.date), Some("2024-02-01".to_string()));
        assert!(fetch_draw(&conn, 8).unwrap().is_none());
    }
}
