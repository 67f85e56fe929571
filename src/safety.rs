use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{errors::FamGraphError, store::RecordStore};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub total_persons: i64,
    pub total_relations: i64,
    pub orphan_relations: i64,
    pub self_loops: i64,
    /// Extra rows beyond the first for each repeated (parent, child) pair.
    pub duplicate_relations: i64,
    pub blank_names: i64,
}

impl IntegrityReport {
    pub fn has_issues(&self) -> bool {
        self.orphan_relations > 0
            || self.self_loops > 0
            || self.duplicate_relations > 0
            || self.blank_names > 0
    }
}

/// SQL-level checks for rows written around the store's own validation,
/// e.g. by tools that leave foreign keys disabled or create `relation`
/// without its primary key.
pub fn run_integrity_checks(store: &RecordStore) -> Result<IntegrityReport, FamGraphError> {
    Ok(IntegrityReport {
        total_persons: query_single(store, "SELECT COUNT(*) FROM person")?,
        total_relations: query_single(store, "SELECT COUNT(*) FROM relation")?,
        orphan_relations: query_single(
            store,
            "SELECT COUNT(*) FROM relation r \
             LEFT JOIN person parent ON parent.id = r.parent_id \
             LEFT JOIN person child ON child.id = r.child_id \
             WHERE parent.id IS NULL OR child.id IS NULL",
        )?,
        self_loops: query_single(
            store,
            "SELECT COUNT(*) FROM relation WHERE parent_id = child_id",
        )?,
        duplicate_relations: query_single(
            store,
            "SELECT COALESCE(SUM(n - 1), 0) FROM ( \
                 SELECT COUNT(*) AS n FROM relation \
                 GROUP BY parent_id, child_id HAVING COUNT(*) > 1 \
             )",
        )?,
        blank_names: query_single(
            store,
            "SELECT COUNT(*) FROM person WHERE TRIM(name) = ''",
        )?,
    })
}

fn query_single(store: &RecordStore, sql: &str) -> Result<i64, FamGraphError> {
    store
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| FamGraphError::query(e.to_string()))
}
