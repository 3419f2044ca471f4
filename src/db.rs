use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

use crate::convert::{ConversionResult, UploadedFile};
use crate::error::ConvertError;

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversions (
            id            INTEGER PRIMARY KEY,
            file_name     TEXT NOT NULL,
            mime_type     TEXT NOT NULL,
            file_size     INTEGER NOT NULL,
            section_count INTEGER NOT NULL DEFAULT 0,
            warning_count INTEGER NOT NULL DEFAULT 0,
            json_path     TEXT,
            status        TEXT NOT NULL CHECK(status IN ('success','failed')),
            error         TEXT,
            converted_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversions_status ON conversions(status);
        ",
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRow {
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub section_count: usize,
    pub warning_count: usize,
    pub json_path: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub converted_at: String,
}

impl ConversionRow {
    pub fn succeeded(result: &ConversionResult) -> Self {
        ConversionRow {
            file_name: result.file_name.clone(),
            mime_type: result.metadata.mime_type.to_string(),
            file_size: result.metadata.file_size,
            section_count: result.data.len(),
            warning_count: result.warnings.len(),
            json_path: result
                .json_path
                .as_ref()
                .map(|p| p.display().to_string()),
            status: "success".into(),
            error: None,
            converted_at: result
                .metadata
                .converted_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn failed(upload: &UploadedFile, err: &ConvertError) -> Self {
        ConversionRow {
            file_name: upload.original_name.clone(),
            mime_type: upload.mime.to_string(),
            file_size: upload.size,
            section_count: 0,
            warning_count: 0,
            json_path: None,
            status: "failed".into(),
            error: Some(err.to_string()),
            converted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn from_outcome(upload: &UploadedFile, outcome: &Result<ConversionResult, ConvertError>) -> Self {
        match outcome {
            Ok(result) => Self::succeeded(result),
            Err(err) => Self::failed(upload, err),
        }
    }
}

const INSERT_SQL: &str = "INSERT INTO conversions
     (file_name, mime_type, file_size, section_count, warning_count, json_path, status, error, converted_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

fn insert_with(stmt: &mut rusqlite::Statement<'_>, r: &ConversionRow) -> Result<()> {
    stmt.execute(rusqlite::params![
        r.file_name,
        r.mime_type,
        r.file_size as i64,
        r.section_count as i64,
        r.warning_count as i64,
        r.json_path,
        r.status,
        r.error,
        r.converted_at,
    ])?;
    Ok(())
}

pub fn insert_conversion(conn: &Connection, row: &ConversionRow) -> Result<i64> {
    let mut stmt = conn.prepare_cached(INSERT_SQL)?;
    insert_with(&mut stmt, row)?;
    Ok(conn.last_insert_rowid())
}

/// All rows in a single transaction.
pub fn insert_conversions(conn: &Connection, rows: &[ConversionRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for r in rows {
            insert_with(&mut stmt, r)?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

/// Newest first.
pub fn fetch_recent(conn: &Connection, limit: usize) -> Result<Vec<ConversionRow>> {
    let mut stmt = conn.prepare(
        "SELECT file_name, mime_type, file_size, section_count, warning_count,
                json_path, status, error, converted_at
         FROM conversions
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(ConversionRow {
                file_name: row.get(0)?,
                mime_type: row.get(1)?,
                file_size: row.get::<_, i64>(2)? as u64,
                section_count: row.get::<_, i64>(3)? as usize,
                warning_count: row.get::<_, i64>(4)? as usize,
                json_path: row.get(5)?,
                status: row.get(6)?,
                error: row.get(7)?,
                converted_at: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub sections: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM conversions", [], |r| r.get(0))?;
    let succeeded: usize = conn.query_row(
        "SELECT COUNT(*) FROM conversions WHERE status = 'success'",
        [],
        |r| r.get(0),
    )?;
    let sections: usize = conn.query_row(
        "SELECT COALESCE(SUM(section_count), 0) FROM conversions",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        succeeded,
        failed: total - succeeded,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::assemble;
    use crate::extract::MimeType;
    use crate::parser::structure_text;
    use std::path::PathBuf;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.into(),
            path: PathBuf::from(format!("uploads/{}", name)),
            size: 10,
            mime: MimeType::PlainText,
        }
    }

    fn success(name: &str, text: &str) -> ConversionRow {
        let mut result = assemble(&upload(name), structure_text(text), Utc::now());
        result.json_path = Some(PathBuf::from("temp/out.json"));
        ConversionRow::succeeded(&result)
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = memory();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn insert_and_fetch() {
        let conn = memory();
        insert_conversion(&conn, &success("a.txt", "Name: A\nRole: B")).unwrap();
        let failed = ConversionRow::failed(
            &upload("b.docx"),
            &ConvertError::Conversion("bad zip".into()),
        );
        insert_conversion(&conn, &failed).unwrap();

        let rows = fetch_recent(&conn, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], failed);
        assert_eq!(rows[0].error.as_deref(), Some("Document conversion failed: bad zip"));
        assert_eq!(rows[1].file_name, "a.txt");
        assert_eq!(rows[1].section_count, 2);
        assert_eq!(rows[1].json_path.as_deref(), Some("temp/out.json"));

        assert_eq!(fetch_recent(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn warnings_are_counted() {
        let row = success("w.txt", "orphan\nTasks:\n- a\nloose");
        assert_eq!(row.section_count, 1);
        assert_eq!(row.warning_count, 2);
    }

    #[test]
    fn batch_insert_and_stats() {
        let conn = memory();
        let rows = vec![
            success("a.txt", "A: 1"),
            success("b.txt", "B: 1\nC: 2\nD: 3"),
            ConversionRow::failed(&upload("c.txt"), &ConvertError::MissingFile),
        ];
        assert_eq!(insert_conversions(&conn, &rows).unwrap(), 3);

        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.sections, 4);
    }

    #[test]
    fn empty_stats() {
        let s = get_stats(&memory()).unwrap();
        assert_eq!((s.total, s.succeeded, s.failed, s.sections), (0, 0, 0, 0));
    }

    #[test]
    fn file_backed_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.sqlite");
        {
            let conn = connect(&path).unwrap();
            init_schema(&conn).unwrap();
            insert_conversion(&conn, &success("a.txt", "A: 1")).unwrap();
        }
        let conn = connect(&path).unwrap();
        assert_eq!(get_stats(&conn).unwrap().total, 1);
    }
}
