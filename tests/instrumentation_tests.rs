use chrono::NaiveDate;
use famgraph::{FamGraphError, Person, RecordStore};

fn person(name: &str) -> Person {
    Person::new(name, NaiveDate::from_ymd_opt(1900, 1, 1).expect("date"))
}

#[test]
fn test_prepare_and_execute_counters_increment() -> Result<(), FamGraphError> {
    let store = RecordStore::open_in_memory()?;
    store.reset_metrics();

    store.list_person_ids()?;

    let after = store.metrics_snapshot();
    assert_eq!(after.prepare_count, 1);
    assert_eq!(after.execute_count, 1);
    assert_eq!(after.select_count, 1);
    Ok(())
}

#[test]
fn test_insert_is_not_counted_as_select() -> Result<(), FamGraphError> {
    let store = RecordStore::open_in_memory()?;
    store.reset_metrics();
    store.insert_person(&person("counter"))?;
    let after = store.metrics_snapshot();
    assert_eq!(after.execute_count, 1);
    assert_eq!(after.select_count, 0);
    Ok(())
}

#[test]
fn test_relation_insert_runs_in_one_transaction() -> Result<(), FamGraphError> {
    let store = RecordStore::open_in_memory()?;
    let a = store.insert_person(&person("a"))?;
    let b = store.insert_person(&person("b"))?;
    store.reset_metrics();
    store.insert_relation(&famgraph::Relation::new(a, b))?;
    let after = store.metrics_snapshot();
    assert_eq!(after.tx_begin_count, 1);
    assert_eq!(after.tx_commit_count, 1);
    assert_eq!(after.tx_rollback_count, 0);
    Ok(())
}

#[test]
fn test_failed_relation_insert_rolls_back() -> Result<(), FamGraphError> {
    let store = RecordStore::open_in_memory()?;
    let a = store.insert_person(&person("a"))?;
    store.reset_metrics();
    assert!(store.insert_relation(&famgraph::Relation::new(a, a + 1)).is_err());
    let after = store.metrics_snapshot();
    assert_eq!(after.tx_begin_count, 1);
    assert_eq!(after.tx_rollback_count, 1);
    assert_eq!(after.tx_commit_count, 0);
    Ok(())
}
