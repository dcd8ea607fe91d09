//! Online index build and index-backed queries under the public API.

use std::ops::Bound;
use terranedb::{Config, GraphStorage, PropertyValue, View};

#[test]
fn index_build_under_load() {
    let storage = GraphStorage::open(Config::in_memory()).unwrap();

    let setup = storage.access();
    for age in [20i64, 30, 40] {
        let v = setup.insert_vertex(None).unwrap();
        setup.add_label(v.gid(), "Person").unwrap();
        setup.set_property(v.gid(), "age", PropertyValue::Int(age)).unwrap();
    }
    setup.commit().unwrap();

    // A writer that predates the build: the build must wait for it, and its
    // insert must land in the index either via the write path or the scan
    let concurrent_writer = storage.access();

    std::thread::scope(|scope| {
        let builder = scope.spawn(|| {
            let accessor = storage.access();
            accessor.build_index("Person", "age").unwrap();
            accessor.commit().unwrap();
        });

        let v = concurrent_writer.insert_vertex(None).unwrap();
        concurrent_writer.add_label(v.gid(), "Person").unwrap();
        concurrent_writer
            .set_property(v.gid(), "age", PropertyValue::Int(33))
            .unwrap();
        concurrent_writer.commit().unwrap();

        builder.join().unwrap();
    });

    let reader = storage.access();
    assert_eq!(
        reader
            .vertices_count_for_value("Person", "age", &PropertyValue::Int(33))
            .unwrap(),
        1
    );
    let found: Vec<_> = reader
        .vertices_with_label_property_value("Person", "age", &PropertyValue::Int(33), View::Current)
        .unwrap()
        .collect();
    assert_eq!(found.len(), 1);
    assert_eq!(
        reader.vertices_count_with_label_property("Person", "age").unwrap(),
        4
    );
    reader.commit().unwrap();
}

#[test]
fn concurrent_index_builds_do_not_deadlock() {
    let storage = GraphStorage::open(Config::in_memory()).unwrap();

    let setup = storage.access();
    let v = setup.insert_vertex(None).unwrap();
    setup.add_label(v.gid(), "Person").unwrap();
    setup.set_property(v.gid(), "name", PropertyValue::from("a")).unwrap();
    setup.set_property(v.gid(), "age", PropertyValue::Int(1)).unwrap();
    setup.commit().unwrap();

    // Two builders are concurrently active; each skips waiting for the
    // other through the building set
    std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            let accessor = storage.access();
            accessor.build_index("Person", "age").unwrap();
            accessor.commit().unwrap();
        });
        let second = scope.spawn(|| {
            let accessor = storage.access();
            accessor.build_index("Person", "name").unwrap();
            accessor.commit().unwrap();
        });
        first.join().unwrap();
        second.join().unwrap();
    });

    let reader = storage.access();
    let mut info = reader.index_info();
    info.sort();
    assert_eq!(
        info,
        vec![
            ("Person".to_string(), "age".to_string()),
            ("Person".to_string(), "name".to_string()),
        ]
    );
    reader.commit().unwrap();
}

#[test]
fn range_queries_over_mixed_numerics() {
    let storage = GraphStorage::open(Config::in_memory()).unwrap();

    let setup = storage.access();
    for value in [
        PropertyValue::Int(1),
        PropertyValue::Double(1.5),
        PropertyValue::Int(2),
        PropertyValue::Double(2.0),
        PropertyValue::Int(3),
    ] {
        let v = setup.insert_vertex(None).unwrap();
        setup.add_label(v.gid(), "Point").unwrap();
        setup.set_property(v.gid(), "score", value).unwrap();
    }
    setup.commit().unwrap();

    let builder = storage.access();
    builder.build_index("Point", "score").unwrap();
    builder.commit().unwrap();

    let reader = storage.access();
    // Int and Double interleave in one numeric ordering: 1, 1.5, 2, 2.0, 3
    assert_eq!(
        reader
            .vertices_count_in_range(
                "Point",
                "score",
                Bound::Excluded(&PropertyValue::Int(1)),
                Bound::Included(&PropertyValue::Double(2.5)),
            )
            .unwrap(),
        3
    );
    assert_eq!(
        reader
            .position_and_count("Point", "score", &PropertyValue::Double(2.0))
            .unwrap(),
        (2, 2)
    );
    reader.commit().unwrap();
}
