//! End-to-end scenarios over a small person table: primary lookups,
//! ordered and range scans, secondary index refresh on update, unique
//! collisions, and watch wakeups across transactions.

use std::thread;
use std::time::Duration;

use arbordb::{
    Arg, Error, IndexSchema, IntField, MemDB, Schema, StringField, TableSchema, WatchSet,
};

#[derive(Debug, Clone, PartialEq)]
struct Person {
    email: String,
    name: String,
    age: i64,
}

fn person(email: &str, name: &str, age: i64) -> Person {
    Person {
        email: email.into(),
        name: name.into(),
        age,
    }
}

fn person_schema() -> Schema<Person> {
    Schema::new().table(
        TableSchema::new("person")
            .index(
                IndexSchema::new(
                    "id",
                    StringField::new(|p: &Person| Some(p.email.as_str())),
                )
                .unique(),
            )
            .index(IndexSchema::new(
                "name",
                StringField::new(|p: &Person| Some(p.name.as_str())),
            ))
            .index(IndexSchema::new("age", IntField::new(8, |p: &Person| p.age))),
    )
}

fn seeded_db() -> MemDB<Person> {
    let db = MemDB::new(person_schema()).unwrap();
    let mut txn = db.txn(true).unwrap();
    txn.insert("person", person("joe@aol.com", "Joe", 30)).unwrap();
    txn.insert("person", person("lucy@aol.com", "Lucy", 35)).unwrap();
    txn.insert("person", person("tariq@aol.com", "Tariq", 21))
        .unwrap();
    txn.insert("person", person("dorothy@aol.com", "Dorothy", 53))
        .unwrap();
    txn.commit().unwrap();
    drop(txn);
    db
}

#[test]
fn primary_lookup_returns_inserted_record() {
    let db = MemDB::new(person_schema()).unwrap();
    let mut txn = db.txn(true).unwrap();
    txn.insert("person", person("joe@aol.com", "Joe", 30)).unwrap();
    txn.commit().unwrap();

    let read = db.txn(false).unwrap();
    let found = read
        .first("person", "id", &[Arg::Str("joe@aol.com")])
        .unwrap()
        .expect("Joe must be found by primary key");
    assert_eq!(*found, person("joe@aol.com", "Joe", 30));
}

#[test]
fn full_scan_yields_primary_key_order() {
    let db = seeded_db();
    let read = db.txn(false).unwrap();
    let names: Vec<String> = read
        .get("person", "id", &[])
        .unwrap()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["Dorothy", "Joe", "Lucy", "Tariq"]);
}

#[test]
fn age_range_scan_with_lower_bound() {
    let db = seeded_db();
    let read = db.txn(false).unwrap();
    let in_range: Vec<(String, i64)> = read
        .lower_bound("person", "age", &[Arg::Int(25)])
        .unwrap()
        .take_while(|p| p.age <= 35)
        .map(|p| (p.name.clone(), p.age))
        .collect();
    assert_eq!(in_range, vec![("Joe".into(), 30), ("Lucy".into(), 35)]);
}

#[test]
fn update_moves_record_between_secondary_keys() {
    let db = MemDB::new(person_schema()).unwrap();
    let mut txn = db.txn(true).unwrap();
    txn.insert("person", person("a@x", "A", 10)).unwrap();
    txn.commit().unwrap();

    let mut txn = db.txn(true).unwrap();
    txn.insert("person", person("a@x", "A", 11)).unwrap();
    txn.commit().unwrap();

    let read = db.txn(false).unwrap();
    assert_eq!(
        read.get("person", "age", &[Arg::Int(10)]).unwrap().count(),
        0,
        "old age entry must be gone after the update"
    );
    let at_11: Vec<_> = read.get("person", "age", &[Arg::Int(11)]).unwrap().collect();
    assert_eq!(at_11.len(), 1);
    assert_eq!(*at_11[0], person("a@x", "A", 11));
}

#[test]
fn same_primary_key_replaces_but_unique_secondary_collides() {
    let unique_name_schema = Schema::new().table(
        TableSchema::new("person")
            .index(
                IndexSchema::new(
                    "id",
                    StringField::new(|p: &Person| Some(p.email.as_str())),
                )
                .unique(),
            )
            .index(
                IndexSchema::new(
                    "name",
                    StringField::new(|p: &Person| Some(p.name.as_str())),
                )
                .unique(),
            ),
    );
    let db = MemDB::new(unique_name_schema).unwrap();

    // Same primary key twice in one transaction: the second replaces.
    let mut txn = db.txn(true).unwrap();
    txn.insert("person", person("a@x", "First", 1)).unwrap();
    txn.insert("person", person("a@x", "Second", 2)).unwrap();

    // Distinct primary keys sharing a unique secondary value collide.
    let err = txn
        .insert("person", person("b@x", "Second", 3))
        .unwrap_err();
    assert!(
        matches!(err, Error::UniqueConstraint { ref index, .. } if index == "name"),
        "expected a unique violation on 'name', got {err:?}"
    );
    txn.commit().unwrap();

    let read = db.txn(false).unwrap();
    let stored = read
        .first("person", "id", &[Arg::Str("a@x")])
        .unwrap()
        .expect("replaced record must exist");
    assert_eq!(stored.name, "Second");
    assert!(read.first("person", "id", &[Arg::Str("b@x")]).unwrap().is_none());
}

#[test]
fn watch_fires_when_a_concurrent_writer_commits() {
    let db = std::sync::Arc::new(seeded_db());

    let read = db.txn(false).unwrap();
    let (channel, _) = read.get_watch("person", "id", &[]).unwrap();
    let mut set = WatchSet::new();
    set.add(channel);

    let writer_db = std::sync::Arc::clone(&db);
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let mut txn = writer_db.txn(true).unwrap();
        txn.insert("person", person("new@aol.com", "New", 40)).unwrap();
        txn.commit().unwrap();
    });

    assert!(
        set.watch_timeout(Duration::from_secs(5)),
        "watch must report triggered after the concurrent commit"
    );
    writer.join().unwrap();
}
