use crate::data::{DataSource, MessageCorpus, MessageRecord, METADATA_COLUMNS};
use crate::error::{AppError, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default table name
pub const DEFAULT_TABLE: &str = "DisasterResponse";

/// Labeled messages stored in one SQLite table.
///
/// `message` is required; `id` and `genre` are read when present and
/// `original` is ignored. Every other column is a category, in table
/// column order.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
    table: String,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn open(&self) -> Result<Connection> {
        // Read-only open never creates a missing database file
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| AppError::Database(format!("cannot open {}: {}", self.path.display(), e)))
    }

    fn columns(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(&self.table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(AppError::Database(format!(
                "table '{}' not found in {}",
                self.table,
                self.path.display()
            )));
        }
        Ok(columns)
    }
}

impl DataSource for SqliteSource {
    fn load(&self) -> Result<MessageCorpus> {
        let conn = self.open()?;
        let columns = self.columns(&conn)?;

        if !columns.iter().any(|c| c == "message") {
            return Err(AppError::Shape(format!(
                "table '{}' has no 'message' column",
                self.table
            )));
        }
        let has_id = columns.iter().any(|c| c == "id");
        let has_genre = columns.iter().any(|c| c == "genre");
        let categories: Vec<String> = columns
            .iter()
            .filter(|c| !METADATA_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect();
        if categories.is_empty() {
            return Err(AppError::Shape(format!(
                "table '{}' has no category columns",
                self.table
            )));
        }

        let mut selected = vec![
            if has_id { quote("id") } else { "NULL".to_string() },
            quote("message"),
            if has_genre { quote("genre") } else { "NULL".to_string() },
        ];
        selected.extend(categories.iter().map(|c| quote(c)));
        let sql = format!("SELECT {} FROM {}", selected.join(", "), quote(&self.table));
        debug!(sql = %sql, "Loading messages");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let row_number = records.len();
            let id: Option<i64> = row.get(0)?;
            let text: Option<String> = row.get(1)?;
            let text = text.ok_or_else(|| {
                AppError::Shape(format!("message is NULL in row {}", row_number))
            })?;
            let genre: Option<String> = row.get(2)?;

            let mut labels = Vec::with_capacity(categories.len());
            for (offset, category) in categories.iter().enumerate() {
                let value: Value = row.get(offset + 3)?;
                labels.push(binary_label(value, category, row_number)?);
            }

            records.push(MessageRecord {
                id,
                text,
                genre,
                labels,
            });
        }

        let corpus = MessageCorpus::from_records(categories, records)?;
        info!(
            path = %self.path.display(),
            table = %self.table,
            messages = corpus.len(),
            categories = corpus.categories().len(),
            "Loaded labeled messages"
        );
        Ok(corpus)
    }
}

fn binary_label(value: Value, category: &str, row: usize) -> Result<u8> {
    match value {
        Value::Integer(v @ (0 | 1)) => Ok(v as u8),
        Value::Real(v) if v == 0.0 || v == 1.0 => Ok(v as u8),
        Value::Null => Err(AppError::Shape(format!(
            "label '{}' is NULL in row {}",
            category, row
        ))),
        other => Err(AppError::Shape(format!(
            "label '{}' has non-binary value {:?} in row {}",
            category, other, row
        ))),
    }
}

/// Quote an SQL identifier
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_db(sql: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        (dir, path)
    }

    const SCHEMA: &str = "CREATE TABLE DisasterResponse (
        id INTEGER, message TEXT, original TEXT, genre TEXT,
        related INTEGER, water INTEGER, fire INTEGER
    );";

    #[test]
    fn test_load_messages() {
        let (_dir, path) = create_db(&format!(
            "{SCHEMA}
            INSERT INTO DisasterResponse VALUES (1, 'We need water', 'Nou bezwen dlo', 'direct', 1, 1, 0);
            INSERT INTO DisasterResponse VALUES (2, 'Fire downtown', NULL, 'news', 1, 0, 1);"
        ));

        let corpus = SqliteSource::new(&path, DEFAULT_TABLE).load().unwrap();

        assert_eq!(corpus.categories(), ["related", "water", "fire"]);
        assert_eq!(corpus.texts(), ["We need water", "Fire downtown"]);
        assert_eq!(corpus.ids(), [Some(1), Some(2)]);
        assert_eq!(corpus.labels().positive_counts(), vec![2, 1, 1]);
        assert_eq!(corpus.summary().genre_counts["news"], 1);
    }

    #[test]
    fn test_null_label_rejected() {
        let (_dir, path) = create_db(&format!(
            "{SCHEMA}
            INSERT INTO DisasterResponse VALUES (1, 'We need water', NULL, 'direct', 1, NULL, 0);"
        ));

        let err = SqliteSource::new(&path, DEFAULT_TABLE).load().unwrap_err();
        assert!(matches!(err, AppError::Shape(_)));
        assert!(err.to_string().contains("water"));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let (_dir, path) = create_db(&format!(
            "{SCHEMA}
            INSERT INTO DisasterResponse VALUES (1, 'We need water', NULL, 'direct', 2, 1, 0);"
        ));

        let err = SqliteSource::new(&path, DEFAULT_TABLE).load().unwrap_err();
        assert!(err.to_string().contains("related"));
    }

    #[test]
    fn test_missing_table() {
        let (_dir, path) = create_db(SCHEMA);
        let err = SqliteSource::new(&path, "Messages").load().unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_missing_file_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        assert!(SqliteSource::new(&path, DEFAULT_TABLE).load().is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_table_without_id_or_genre() {
        let (_dir, path) = create_db(
            "CREATE TABLE Messages (message TEXT, shelter INTEGER);
            INSERT INTO Messages VALUES ('tents please', 1);",
        );

        let corpus = SqliteSource::new(&path, "Messages").load().unwrap();
        assert_eq!(corpus.categories(), ["shelter"]);
        assert_eq!(corpus.ids(), [None]);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote("water"), "\"water\"");
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }
}
