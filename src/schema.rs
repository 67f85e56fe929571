use rusqlite::Connection;

use crate::errors::FamGraphError;

pub fn ensure_schema(conn: &Connection) -> Result<(), FamGraphError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS person (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL,
            birth_date DATE NOT NULL,
            death_date DATE,
            image_path TEXT
        );
        CREATE TABLE IF NOT EXISTS relation (
            parent_id INTEGER NOT NULL REFERENCES person(id),
            child_id  INTEGER NOT NULL REFERENCES person(id),
            CONSTRAINT pk__relation PRIMARY KEY (parent_id, child_id)
        );
        CREATE INDEX IF NOT EXISTS ix__relation_child_id ON relation(child_id);
        "#,
    )
    .map_err(|e| FamGraphError::schema(e.to_string()))?;
    Ok(())
}
