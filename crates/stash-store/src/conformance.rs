//! Behaviour every [`Storage`] implementation must share.
//!
//! Each backend's test module calls these against a fresh instance.

use std::sync::Arc;

use crate::record::{Record, RecordList};
use crate::traits::Storage;

pub(crate) async fn write_then_read(store: &dyn Storage) {
    let written = Record::new("w1", "conformance.Widget", br#"{"name":"bolt"}"#.to_vec());
    store.write(&written).await.unwrap();

    let mut read = Record::key("w1", "conformance.Widget");
    store.read(&mut read).await.unwrap();
    assert_eq!(read, written);
}

pub(crate) async fn same_id_in_two_types_is_two_records(store: &dyn Storage) {
    store.write(&Record::new("shared", "a", vec![1])).await.unwrap();
    store.write(&Record::new("shared", "b", vec![2])).await.unwrap();

    let mut a = Record::key("shared", "a");
    store.read(&mut a).await.unwrap();
    assert_eq!(a.payload, vec![1]);

    let mut b = Record::key("shared", "b");
    store.read(&mut b).await.unwrap();
    assert_eq!(b.payload, vec![2]);
}

pub(crate) async fn delete_then_read_is_not_found(store: &dyn Storage) {
    store.write(&Record::new("d1", "t", vec![7])).await.unwrap();
    store.delete(&Record::key("d1", "t")).await.unwrap();

    let err = store.read(&mut Record::key("d1", "t")).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");

    // Deleting something that never existed is fine, and still reads as absent.
    store.delete(&Record::key("ghost", "t")).await.unwrap();
    let err = store.read(&mut Record::key("ghost", "t")).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

pub(crate) async fn list_filters_by_type(store: &dyn Storage) {
    for i in 0..5 {
        store
            .write(&Record::new(format!("x{i}"), "x", vec![i]))
            .await
            .unwrap();
        store
            .write(&Record::new(format!("y{i}"), "y", vec![i]))
            .await
            .unwrap();
    }
    store.write(&Record::new("z0", "z", vec![0])).await.unwrap();

    let mut list = RecordList::new("x");
    store.list(&mut list).await.unwrap();
    assert_eq!(list.count(), Some(5));
    assert_eq!(list.ids(), vec!["x0", "x1", "x2", "x3", "x4"]);
    assert!(list.records().iter().all(|r| r.record_type == "x"));
    for record in list.records() {
        let i: u8 = record.id[1..].parse().unwrap();
        assert_eq!(record.payload, vec![i]);
    }

    let mut empty = RecordList::new("nothing-here");
    store.list(&mut empty).await.unwrap();
    assert_eq!(empty.count(), Some(0));
    assert!(empty.is_empty());
}

pub(crate) async fn end_to_end(store: &dyn Storage) {
    store.write(&Record::new("a1", "t", vec![1, 2, 3])).await.unwrap();
    let mut read = Record::key("a1", "t");
    store.read(&mut read).await.unwrap();
    assert_eq!(read.payload, vec![1, 2, 3]);

    store.write(&Record::new("a1", "t", vec![9])).await.unwrap();
    let mut read = Record::key("a1", "t");
    store.read(&mut read).await.unwrap();
    assert_eq!(read.payload, vec![9]);

    store.delete(&Record::key("a1", "t")).await.unwrap();
    let err = store.read(&mut Record::key("a1", "t")).await.unwrap_err();
    assert!(err.is_not_found());

    for i in 0..4 {
        store.write(&Record::new(format!("x-{i}"), "x", vec![i])).await.unwrap();
        store.write(&Record::new(format!("y-{i}"), "y", vec![i])).await.unwrap();
    }
    let mut list = RecordList::new("x");
    store.list(&mut list).await.unwrap();
    assert_eq!(list.count(), Some(4));
    assert_eq!(list.len(), 4);
}

pub(crate) async fn concurrent_writers(store: Arc<dyn Storage>) {
    let handles: Vec<_> = (0..100)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let record = Record::new(format!("c{i:03}"), "concurrent", vec![i as u8]);
                store.write(&record).await.unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("writer task should not panic");
    }

    let mut list = RecordList::new("concurrent");
    store.list(&mut list).await.unwrap();
    assert_eq!(list.count(), Some(100));
    assert_eq!(list.len(), 100);
}

/// Runs every single-store check against stores produced by `fresh`.
pub(crate) async fn run_all<F>(mut fresh: F)
where
    F: FnMut() -> Box<dyn Storage>,
{
    write_then_read(fresh().as_ref()).await;
    same_id_in_two_types_is_two_records(fresh().as_ref()).await;
    delete_then_read_is_not_found(fresh().as_ref()).await;
    list_filters_by_type(fresh().as_ref()).await;
    end_to_end(fresh().as_ref()).await;
}
