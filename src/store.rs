use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};

use ahash::AHashMap;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, error, info};

use crate::{
    config::StoreOptions,
    errors::FamGraphError,
    metrics::{InstrumentedConnection, StoreMetrics, StoreMetricsSnapshot},
    model::{Person, PersonRecord, Relation, row_to_person, validate_person, validate_relation},
    schema::ensure_schema,
};

const SELECT_PERSONS: &str =
    "SELECT id, name, birth_date, death_date, image_path FROM person ORDER BY id";
const SELECT_RELATIONS: &str = "SELECT parent_id, child_id FROM relation ORDER BY rowid";
const PROGRESS_STEPS: i32 = 1_000;

/// Where the record store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Memory,
    File(PathBuf),
}

impl Locator {
    /// Accepts a plain path, `memory`, `:memory:`, or a `sqlite://` URI
    /// (`sqlite:///relative.db`, `sqlite:////absolute.db`, bare `sqlite://`
    /// for memory).
    pub fn parse(raw: &str) -> Result<Self, FamGraphError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FamGraphError::connection("database locator is empty"));
        }
        if trimmed == "memory" || trimmed == ":memory:" {
            return Ok(Locator::Memory);
        }
        if let Some(rest) = trimmed.strip_prefix("sqlite://") {
            return match rest {
                "" | "/" | "/:memory:" => Ok(Locator::Memory),
                _ => match rest.strip_prefix('/') {
                    Some(path) => Ok(Locator::File(PathBuf::from(path))),
                    None => Err(FamGraphError::connection(format!(
                        "malformed sqlite locator {trimmed}: expected sqlite:///<path>"
                    ))),
                },
            };
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return Err(FamGraphError::connection(format!(
                "unsupported locator scheme {scheme}"
            )));
        }
        Ok(Locator::File(PathBuf::from(trimmed)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Memory => write!(f, ":memory:"),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct RecordStore {
    conn: Connection,
    options: StoreOptions,
    metrics: StoreMetrics,
}

/// Opens the store at `locator`, creating the tables when they are missing.
pub fn initialize_schema(locator: &str) -> Result<RecordStore, FamGraphError> {
    RecordStore::open(locator)
}

impl RecordStore {
    pub fn open(locator: &str) -> Result<Self, FamGraphError> {
        Self::open_with(locator, StoreOptions::default())
    }

    pub fn open_with(locator: &str, options: StoreOptions) -> Result<Self, FamGraphError> {
        let locator = Locator::parse(locator)?;
        info!(%locator, "connecting to family database");
        let conn = match &locator {
            Locator::Memory => Connection::open_in_memory(),
            Locator::File(path) => Connection::open(path),
        }
        .map_err(|e| {
            error!(%locator, error = %e, "could not open family database");
            FamGraphError::connection(format!("{locator}: {e}"))
        })?;
        Self::from_connection(conn, options)
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, FamGraphError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| FamGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, StoreOptions::default())
    }

    pub fn open_in_memory() -> Result<Self, FamGraphError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FamGraphError::connection(e.to_string()))?;
        Self::from_connection(conn, StoreOptions::default())
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn metrics_snapshot(&self) -> StoreMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn insert_person(&self, person: &Person) -> Result<i64, FamGraphError> {
        validate_person(person)?;
        let conn = self.connection();
        conn.execute(
            "INSERT INTO person(name, birth_date, death_date, image_path) VALUES(?1, ?2, ?3, ?4)",
            params![
                person.name.as_str(),
                person.birth_date,
                person.death_date,
                person.image_path.as_deref(),
            ],
        )
        .map_err(|e| FamGraphError::query(e.to_string()))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_person(&self, id: i64) -> Result<Person, FamGraphError> {
        self.connection()
            .query_row(
                "SELECT id, name, birth_date, death_date, image_path FROM person WHERE id=?1",
                params![id],
                row_to_person,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    FamGraphError::not_found(format!("person {id}"))
                }
                other => FamGraphError::query(other.to_string()),
            })
    }

    pub fn update_person(&self, person: &Person) -> Result<(), FamGraphError> {
        if person.id <= 0 {
            return Err(FamGraphError::invalid_input(
                "person id must be positive for update",
            ));
        }
        validate_person(person)?;
        let affected = self
            .connection()
            .execute(
                "UPDATE person SET name=?1, birth_date=?2, death_date=?3, image_path=?4 WHERE id=?5",
                params![
                    person.name.as_str(),
                    person.birth_date,
                    person.death_date,
                    person.image_path.as_deref(),
                    person.id,
                ],
            )
            .map_err(|e| FamGraphError::query(e.to_string()))?;
        if affected == 0 {
            return Err(FamGraphError::not_found(format!("person {}", person.id)));
        }
        Ok(())
    }

    /// Deletes the person and every relation touching them.
    pub fn delete_person(&self, id: i64) -> Result<(), FamGraphError> {
        self.in_transaction("BEGIN IMMEDIATE", |conn| {
            conn.execute(
                "DELETE FROM relation WHERE parent_id=?1 OR child_id=?1",
                params![id],
            )
            .map_err(|e| FamGraphError::query(e.to_string()))?;
            let affected = conn
                .execute("DELETE FROM person WHERE id=?1", params![id])
                .map_err(|e| FamGraphError::query(e.to_string()))?;
            if affected == 0 {
                return Err(FamGraphError::not_found(format!("person {id}")));
            }
            Ok(())
        })
    }

    /// Adds a parent -> child relation. Rejects missing endpoints, duplicate
    /// pairs, self-loops and any relation that would close a directed cycle.
    pub fn insert_relation(&self, relation: &Relation) -> Result<(), FamGraphError> {
        validate_relation(relation)?;
        self.in_transaction("BEGIN IMMEDIATE", |conn| {
            for id in [relation.parent_id, relation.child_id] {
                if !person_exists(conn, id)? {
                    return Err(FamGraphError::invalid_input(format!(
                        "relation endpoint {id} does not reference an existing person"
                    )));
                }
            }
            if relation_exists(conn, relation)? {
                return Err(FamGraphError::invalid_input(format!(
                    "relation {} -> {} already exists",
                    relation.parent_id, relation.child_id
                )));
            }
            if let Some(path) = descent_path(conn, relation.child_id, relation.parent_id)? {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(relation.parent_id);
                cycle.extend(path);
                return Err(FamGraphError::CycleDetected(cycle));
            }
            conn.execute(
                "INSERT INTO relation(parent_id, child_id) VALUES(?1, ?2)",
                params![relation.parent_id, relation.child_id],
            )
            .map_err(|e| FamGraphError::query(e.to_string()))?;
            Ok(())
        })
    }

    pub fn delete_relation(&self, relation: &Relation) -> Result<(), FamGraphError> {
        let affected = self
            .connection()
            .execute(
                "DELETE FROM relation WHERE parent_id=?1 AND child_id=?2",
                params![relation.parent_id, relation.child_id],
            )
            .map_err(|e| FamGraphError::query(e.to_string()))?;
        if affected == 0 {
            return Err(FamGraphError::not_found(format!(
                "relation {} -> {}",
                relation.parent_id, relation.child_id
            )));
        }
        Ok(())
    }

    pub fn list_person_ids(&self) -> Result<Vec<i64>, FamGraphError> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare_cached("SELECT id FROM person ORDER BY id")
            .map_err(|e| FamGraphError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| FamGraphError::query(e.to_string()))?;
        let mut ids = Vec::new();
        for id in rows {
            ids.push(id.map_err(|e| FamGraphError::query(e.to_string()))?);
        }
        Ok(ids)
    }

    pub fn person_count(&self) -> Result<i64, FamGraphError> {
        self.count("SELECT COUNT(*) FROM person")
    }

    pub fn relation_count(&self) -> Result<i64, FamGraphError> {
        self.count("SELECT COUNT(*) FROM relation")
    }

    /// Every person with their resolved children, in two statements inside a
    /// single read transaction. The statement count does not depend on the
    /// number of people or relations.
    ///
    /// Lock waits and statement execution share one deadline: each
    /// statement may only wait on a writer for whatever time is left.
    pub fn fetch_all_persons_with_children(&self) -> Result<Vec<PersonRecord>, FamGraphError> {
        let deadline = Instant::now() + self.options.fetch_timeout;
        self.conn
            .progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));
        let result = self.in_transaction("BEGIN DEFERRED", |conn| read_records(conn, deadline));
        self.conn.progress_handler(0, None::<fn() -> bool>);
        let restored = self
            .conn
            .busy_timeout(self.options.fetch_timeout)
            .map_err(|e| FamGraphError::connection(e.to_string()));
        let records = result?;
        restored?;
        debug!(persons = records.len(), "fetched family records");
        Ok(records)
    }

    pub(crate) fn connection(&self) -> InstrumentedConnection<'_> {
        InstrumentedConnection::new(&self.conn, &self.metrics)
    }

    fn count(&self, sql: &str) -> Result<i64, FamGraphError> {
        self.connection()
            .query_row(sql, [], |row| row.get(0))
            .map_err(|e| FamGraphError::query(e.to_string()))
    }

    fn in_transaction<T, F>(&self, begin: &str, body: F) -> Result<T, FamGraphError>
    where
        F: FnOnce(InstrumentedConnection<'_>) -> Result<T, FamGraphError>,
    {
        let conn = self.connection();
        conn.execute_batch(begin).map_err(map_read_error)?;
        match body(conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT").map_err(map_read_error)?;
                Ok(value)
            }
            Err(err) => {
                // the original error is more useful than a failed rollback
                let _ = conn.execute_batch("ROLLBACK");
                Err(err)
            }
        }
    }

    fn from_connection(conn: Connection, options: StoreOptions) -> Result<Self, FamGraphError> {
        conn.busy_timeout(options.fetch_timeout)
            .map_err(|e| FamGraphError::connection(e.to_string()))?;
        ensure_schema(&conn).map_err(|err| match err {
            FamGraphError::SchemaError(msg) => FamGraphError::connection(msg),
            other => other,
        })?;
        conn.set_prepared_statement_cache_capacity(32);
        Ok(Self {
            conn,
            options,
            metrics: StoreMetrics::default(),
        })
    }
}

fn read_records(
    conn: InstrumentedConnection<'_>,
    deadline: Instant,
) -> Result<Vec<PersonRecord>, FamGraphError> {
    let mut records = Vec::new();
    let mut positions: AHashMap<i64, usize> = AHashMap::new();
    {
        arm_busy_wait(conn, deadline)?;
        let mut stmt = conn
            .prepare_cached(SELECT_PERSONS)
            .map_err(map_read_error)?;
        let rows = stmt
            .query_map([], row_to_person)
            .map_err(map_read_error)?;
        for row in rows {
            let person = row.map_err(map_read_error)?;
            positions.insert(person.id, records.len());
            records.push(PersonRecord {
                person,
                children: Vec::new(),
            });
        }
    }

    arm_busy_wait(conn, deadline)?;
    let mut stmt = conn
        .prepare_cached(SELECT_RELATIONS)
        .map_err(map_read_error)?;
    let rows = stmt
        .query_map([], |row| Ok(Relation::new(row.get(0)?, row.get(1)?)))
        .map_err(map_read_error)?;
    for row in rows {
        let relation = row.map_err(map_read_error)?;
        let Some(&position) = positions.get(&relation.parent_id) else {
            return Err(FamGraphError::DanglingReference {
                parent_id: relation.parent_id,
                child_id: relation.child_id,
                missing_id: relation.parent_id,
            });
        };
        records[position].children.push(relation.child_id);
    }
    Ok(records)
}

/// Caps the next lock wait at the time left before `deadline`.
fn arm_busy_wait(conn: InstrumentedConnection<'_>, deadline: Instant) -> Result<(), FamGraphError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(FamGraphError::connection(
            "store unavailable: fetch deadline exceeded",
        ));
    }
    conn.busy_timeout(remaining)
        .map_err(|e| FamGraphError::connection(e.to_string()))
}

fn person_exists(conn: InstrumentedConnection<'_>, id: i64) -> Result<bool, FamGraphError> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM person WHERE id=?1", params![id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| FamGraphError::query(e.to_string()))?;
    Ok(exists.is_some())
}

fn relation_exists(
    conn: InstrumentedConnection<'_>,
    relation: &Relation,
) -> Result<bool, FamGraphError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM relation WHERE parent_id=?1 AND child_id=?2",
            params![relation.parent_id, relation.child_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| FamGraphError::query(e.to_string()))?;
    Ok(exists.is_some())
}

/// Child-edge path from `ancestor` down to `candidate`, both ends included,
/// when one exists. The CTE records the parent each id was reached through;
/// the path is rebuilt by walking those back from `candidate`.
fn descent_path(
    conn: InstrumentedConnection<'_>,
    ancestor: i64,
    candidate: i64,
) -> Result<Option<Vec<i64>>, FamGraphError> {
    let mut stmt = conn
        .prepare_cached(
            "WITH RECURSIVE descendants(id, via) AS (
                 SELECT child_id, parent_id FROM relation WHERE parent_id=?1
                 UNION
                 SELECT r.child_id, r.parent_id FROM relation r
                 JOIN descendants d ON r.parent_id = d.id
             )
             SELECT id, via FROM descendants",
        )
        .map_err(|e| FamGraphError::query(e.to_string()))?;
    let rows = stmt
        .query_map(params![ancestor], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|e| FamGraphError::query(e.to_string()))?;
    let mut reached_via: AHashMap<i64, i64> = AHashMap::new();
    for row in rows {
        let (id, via) = row.map_err(|e| FamGraphError::query(e.to_string()))?;
        reached_via.entry(id).or_insert(via);
    }
    if !reached_via.contains_key(&candidate) {
        return Ok(None);
    }

    let mut path = vec![candidate];
    let mut current = candidate;
    while current != ancestor {
        match reached_via.get(&current) {
            Some(&via) if path.len() <= reached_via.len() => {
                path.push(via);
                current = via;
            }
            // the via chain loops only when the store already holds a cycle
            _ => return Ok(Some(vec![ancestor, candidate])),
        }
    }
    path.reverse();
    Ok(Some(path))
}

/// Lock waits and deadline interrupts mean the store could not be read in
/// time; everything else is a query failure.
fn map_read_error(err: rusqlite::Error) -> FamGraphError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy)
        | Some(ErrorCode::DatabaseLocked)
        | Some(ErrorCode::OperationInterrupted) => {
            FamGraphError::connection(format!("store unavailable: {err}"))
        }
        _ => FamGraphError::query(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_accepts_sqlite_uris() {
        assert_eq!(Locator::parse("sqlite://").expect("memory"), Locator::Memory);
        assert_eq!(
            Locator::parse("sqlite:///data/family.db").expect("relative"),
            Locator::File(PathBuf::from("data/family.db"))
        );
        assert_eq!(
            Locator::parse("sqlite:////var/family.db").expect("absolute"),
            Locator::File(PathBuf::from("/var/family.db"))
        );
        assert_eq!(
            Locator::parse("family.db").expect("path"),
            Locator::File(PathBuf::from("family.db"))
        );
    }

    #[test]
    fn locator_rejects_malformed_input() {
        for raw in ["", "   ", "postgres://localhost/family", "sqlite://host/family.db"] {
            match Locator::parse(raw) {
                Err(FamGraphError::ConnectionError(_)) => {}
                other => panic!("expected ConnectionError for {raw:?}, got {other:?}"),
            }
        }
    }
}
