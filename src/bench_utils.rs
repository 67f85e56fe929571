use chrono::NaiveDate;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    errors::FamGraphError,
    model::{Person, Relation},
    store::RecordStore,
};

/// Synthetic family: people plus parent -> child pairs as indices into
/// `persons`. Edges always point from an earlier generation to a later one,
/// so the result is acyclic.
#[derive(Clone, Debug)]
pub struct FamilyDataset {
    pub persons: Vec<Person>,
    pub relations: Vec<(usize, usize)>,
}

impl FamilyDataset {
    pub fn persons(&self) -> usize {
        self.persons.len()
    }

    pub fn relations(&self) -> usize {
        self.relations.len()
    }

    /// Inserts the dataset and returns the assigned ids, index-aligned with
    /// `persons`.
    pub fn populate(&self, store: &RecordStore) -> Result<Vec<i64>, FamGraphError> {
        let mut ids = Vec::with_capacity(self.persons.len());
        for person in &self.persons {
            ids.push(store.insert_person(person)?);
        }
        for &(parent, child) in &self.relations {
            store.insert_relation(&Relation::new(ids[parent], ids[child]))?;
        }
        Ok(ids)
    }
}

/// `generations` layers starting from one founding couple; each couple in a
/// layer has between one and `max_children` children, who pair up to form
/// the next layer's couples.
pub fn generate_family(generations: usize, max_children: usize, seed: u64) -> FamilyDataset {
    assert!(max_children > 0, "max_children must be positive");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut persons = Vec::new();
    let mut relations = Vec::new();

    let founding_year = 1800;
    let mut layer = vec![
        push_person(&mut persons, &mut rng, founding_year),
        push_person(&mut persons, &mut rng, founding_year),
    ];
    for generation in 1..generations {
        let year = founding_year + 25 * generation as i32;
        let mut next = Vec::new();
        for couple in layer.chunks(2) {
            let count = rng.gen_range(1..=max_children);
            for _ in 0..count {
                let child = push_person(&mut persons, &mut rng, year);
                for &parent in couple {
                    relations.push((parent, child));
                }
                next.push(child);
            }
        }
        layer = next;
    }
    FamilyDataset { persons, relations }
}

fn push_person(persons: &mut Vec<Person>, rng: &mut StdRng, base_year: i32) -> usize {
    let idx = persons.len();
    let birth = date(base_year + rng.gen_range(0..5), rng.gen_range(1..=12), rng.gen_range(1..=28));
    let mut person = Person::new(format!("person-{idx}"), birth);
    if base_year < 1930 {
        let lifespan = rng.gen_range(40..90);
        person.death_date = Some(date(base_year + lifespan, rng.gen_range(1..=12), 1));
    }
    persons.push(person);
    idx
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}
