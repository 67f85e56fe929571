use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::FamGraphError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub birth_date: NaiveDate,
    pub death_date: Option<NaiveDate>,
    pub image_path: Option<String>,
}

impl Person {
    /// Unsaved person; the store assigns the id on insert.
    pub fn new<T: Into<String>>(name: T, birth_date: NaiveDate) -> Self {
        Self {
            id: 0,
            name: name.into(),
            birth_date,
            death_date: None,
            image_path: None,
        }
    }

    pub fn with_death_date(mut self, death_date: NaiveDate) -> Self {
        self.death_date = Some(death_date);
        self
    }

    pub fn with_image_path<T: Into<String>>(mut self, image_path: T) -> Self {
        self.image_path = Some(image_path.into());
        self
    }

    pub fn is_living(&self) -> bool {
        self.death_date.is_none()
    }

    pub fn birth_year(&self) -> i32 {
        self.birth_date.year()
    }

    pub fn death_year(&self) -> Option<i32> {
        self.death_date.map(|date| date.year())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Relation {
    pub parent_id: i64,
    pub child_id: i64,
}

impl Relation {
    pub fn new(parent_id: i64, child_id: i64) -> Self {
        Self {
            parent_id,
            child_id,
        }
    }
}

/// One person row together with the ids of its children, as returned by the
/// bulk fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    pub person: Person,
    pub children: Vec<i64>,
}

pub fn validate_person(person: &Person) -> Result<(), FamGraphError> {
    if person.name.trim().is_empty() {
        return Err(FamGraphError::invalid_input("person name must be set"));
    }
    if let Some(path) = person.image_path.as_deref() {
        if path.trim().is_empty() {
            return Err(FamGraphError::invalid_input(
                "image path must be omitted rather than empty",
            ));
        }
    }
    Ok(())
}

pub fn validate_relation(relation: &Relation) -> Result<(), FamGraphError> {
    if relation.parent_id <= 0 || relation.child_id <= 0 {
        return Err(FamGraphError::invalid_input(
            "relation endpoints must be positive ids",
        ));
    }
    if relation.parent_id == relation.child_id {
        return Err(FamGraphError::CycleDetected(vec![
            relation.parent_id,
            relation.child_id,
        ]));
    }
    Ok(())
}

pub fn row_to_person(row: &rusqlite::Row<'_>) -> Result<Person, rusqlite::Error> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        birth_date: row.get(2)?,
        death_date: row.get(3)?,
        image_path: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn blank_name_is_rejected() {
        let person = Person::new("   ", date(1950, 1, 1));
        assert!(matches!(
            validate_person(&person),
            Err(FamGraphError::InvalidInput(_))
        ));
    }

    #[test]
    fn self_loop_is_rejected() {
        assert!(matches!(
            validate_relation(&Relation::new(3, 3)),
            Err(FamGraphError::CycleDetected(ids)) if ids == vec![3, 3]
        ));
        assert!(validate_relation(&Relation::new(3, 4)).is_ok());
    }

    #[test]
    fn years_come_from_dates() {
        let person = Person::new("Ada", date(1815, 12, 10)).with_death_date(date(1852, 11, 27));
        assert_eq!(person.birth_year(), 1815);
        assert_eq!(person.death_year(), Some(1852));
        assert!(!person.is_living());
    }
}
