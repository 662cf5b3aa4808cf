//! Common test utilities
//!
//! Builds throwaway SQLite message databases shaped like the training
//! data: `id`, `message`, `original`, `genre` and one column per category.

#![allow(dead_code)]

use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};

pub const CATEGORIES: &[&str] = &["related", "water", "fire", "child_alone"];

/// One labeled message: text, genre, labels in `CATEGORIES` order
pub type Row = (&'static str, &'static str, [u8; 4]);

pub fn sample_rows() -> Vec<Row> {
    let water = [
        "water shortage in the village",
        "we need clean drinking water",
        "no water since the storm",
        "please send water to the camp",
        "the water supply is contaminated",
        "families are thirsty and need water",
        "water tanks are empty",
        "bottled water needed urgently",
        "severe water shortage reported",
        "children have no water",
    ];
    let fire = [
        "fire in the market",
        "the fire is spreading to houses",
        "building on fire downtown",
        "big fire near the school",
        "fire trucks needed now",
        "fire destroyed the warehouse",
        "forest fire approaching the town",
        "smoke and fire everywhere",
        "the church caught fire",
        "a fire broke out last night",
    ];

    let mut rows = Vec::new();
    for (w, f) in water.into_iter().zip(fire) {
        rows.push((w, "direct", [1, 1, 0, 0]));
        rows.push((f, "news", [1, 0, 1, 0]));
    }
    rows.push(("hello how are you", "social", [0, 0, 0, 0]));
    rows.push(("good morning everyone", "social", [0, 0, 0, 0]));
    rows
}

/// Create `DisasterResponse` in a new database at `dir/name`
pub fn create_message_db(dir: &Path, name: &str, rows: &[Row]) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).expect("open test database");

    let category_columns: Vec<String> = CATEGORIES
        .iter()
        .map(|c| format!("{} INTEGER", c))
        .collect();
    conn.execute_batch(&format!(
        "CREATE TABLE DisasterResponse (id INTEGER PRIMARY KEY, message TEXT, original TEXT, genre TEXT, {});",
        category_columns.join(", ")
    ))
    .expect("create table");

    let placeholders = vec!["?"; CATEGORIES.len() + 3].join(", ");
    let sql = format!(
        "INSERT INTO DisasterResponse (id, message, genre, {}) VALUES ({})",
        CATEGORIES.join(", "),
        placeholders
    );
    for (i, (text, genre, labels)) in rows.iter().enumerate() {
        let mut values: Vec<rusqlite::types::Value> = vec![
            (i as i64 + 1).into(),
            text.to_string().into(),
            genre.to_string().into(),
        ];
        values.extend(labels.iter().map(|&l| rusqlite::types::Value::from(i64::from(l))));
        conn.execute(&sql, params_from_iter(values)).expect("insert row");
    }

    path
}

/// Small grid so end-to-end runs stay fast
pub const FAST_CONFIG: &str = r#"
[search]
folds = 3
threads = 2

[search.grid]
ngram_range = [[1, 1]]
max_df = [1.0]
use_idf = [true, false]
n_trees = [15]
min_samples_split = [2]

[vectorizer]
max_features = 500
"#;
