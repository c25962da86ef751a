//! Scenario builders for common object-graph shapes.

use crate::fixtures::{person, project, TestHarness};
use relmap_core::{ObjectRef, Transaction};
use relmap_store::Value;

/// Registers a person owning the given projects, all linked under the
/// `projects` reference.
pub fn person_with_projects(
    harness: &TestHarness,
    txn: &mut Transaction,
    person_key: i64,
    project_keys: &[i64],
) {
    harness.insert_person(txn, person_key, &format!("person-{person_key}"));
    for &key in project_keys {
        let handle = harness.insert_project(txn, key, &format!("project-{key}"));
        harness
            .manager
            .link(
                txn,
                &person(person_key),
                "projects",
                ObjectRef::materialized(project(key), handle),
            )
            .expect("link failed");
    }
}

/// Registers a chain of people where each reports to the next, with the
/// last reporting back to the first.
///
/// With the `manager` reference unconstrained this graph orders fine;
/// marking it constrained makes the cycle unorderable.
pub fn management_cycle(harness: &TestHarness, txn: &mut Transaction, keys: &[i64]) {
    for &key in keys {
        harness.insert_person(txn, key, &format!("person-{key}"));
    }
    for (i, &key) in keys.iter().enumerate() {
        let next = keys[(i + 1) % keys.len()];
        harness
            .manager
            .link(txn, &person(key), "manager", ObjectRef::lazy(person(next)))
            .expect("link failed");
    }
}

/// Seeds the store directly with `count` committed person rows, keyed
/// 1 through `count`, each at version 1.
pub fn populated_people(harness: &TestHarness, count: i64) {
    for key in 1..=count {
        let mut image = crate::fixtures::named_row(&format!("person-{key}"));
        image.set("version", Value::Int(1));
        harness.seed(&person(key), image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::PROJECTS;

    #[test]
    fn person_with_projects_commits() {
        let harness = TestHarness::new();
        let mut txn = harness.begin();
        person_with_projects(&harness, &mut txn, 1, &[10, 11, 12]);
        harness.commit(&mut txn).expect("commit failed");
        assert_eq!(harness.store.row_count(PROJECTS), 3);
    }

    #[test]
    fn management_cycle_orders_when_unconstrained() {
        let harness = TestHarness::new();
        let mut txn = harness.begin();
        management_cycle(&harness, &mut txn, &[1, 2, 3, 4]);
        harness.commit(&mut txn).expect("commit failed");
        assert!(harness.stored(&person(4)).is_some());
    }

    #[test]
    fn populated_people_seeds_rows() {
        let harness = TestHarness::new();
        populated_people(&harness, 5);
        assert!(harness.stored(&person(5)).is_some());
    }
}
