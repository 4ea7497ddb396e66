//! Database schema definitions

use crate::Result;
use crate::storage::Database;

/// Largest value a medium text column holds, in bytes
pub const MEDIUM_TEXT_MAX_BYTES: usize = 16_777_215;

/// SQL to create the authors table
pub const CREATE_AUTHORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email VARCHAR(100) NOT NULL UNIQUE CHECK (length(email) BETWEEN 1 AND 100),
    name VARCHAR(100) NOT NULL CHECK (length(name) BETWEEN 1 AND 100),
    hashed_password VARCHAR(100) NOT NULL CHECK (length(hashed_password) BETWEEN 1 AND 100)
)
"#;

/// SQL to create the entries table
///
/// `author_id` declares no ON DELETE action, so removing a referenced
/// author is rejected by the engine.
pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id INTEGER NOT NULL REFERENCES authors (id),
    slug VARCHAR(100) NOT NULL UNIQUE CHECK (length(slug) BETWEEN 1 AND 100),
    title VARCHAR(512) NOT NULL CHECK (length(title) BETWEEN 1 AND 512),
    markdown MEDIUMTEXT NOT NULL CHECK (length(CAST(markdown AS BLOB)) <= 16777215),
    html MEDIUMTEXT NOT NULL CHECK (length(CAST(html AS BLOB)) <= 16777215),
    published DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    updated DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
)
"#;

/// Refreshes `updated` on every modification of an entry row
pub const CREATE_TOUCH_UPDATED_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS entries_touch_updated
AFTER UPDATE ON entries
FOR EACH ROW
BEGIN
    UPDATE entries SET updated = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = NEW.id;
END
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS entries_published ON entries (published)",
];

/// Drop statements, dependents first
pub const DROP_STATEMENTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS entries_touch_updated",
    "DROP TABLE IF EXISTS entries",
    "DROP TABLE IF EXISTS authors",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_AUTHORS_TABLE,
        CREATE_ENTRIES_TABLE,
        CREATE_TOUCH_UPDATED_TRIGGER,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Create any missing tables, index and trigger. Safe to run repeatedly.
pub fn create(db: &Database) -> Result<()> {
    db.transaction(|tx| {
        for stmt in all_schema_statements() {
            tx.execute_rowcount(stmt, [])?;
        }
        Ok(())
    })
}

/// Drop both tables and recreate them. Destroys all stored data.
pub fn provision(db: &Database) -> Result<()> {
    tracing::info!("Provisioning schema on {}", db.target());
    db.transaction(|tx| {
        for stmt in DROP_STATEMENTS.iter().copied().chain(all_schema_statements()) {
            tx.execute_rowcount(stmt, [])?;
        }
        Ok(())
    })
}

/// Names of the user tables in the connected database
pub fn table_names(db: &Database) -> Result<Vec<String>> {
    let rows = db.query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        [],
    )?;
    rows.iter().map(|row| row.get::<String>("name")).collect()
}
