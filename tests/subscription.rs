mod custom_error;

use std::sync::{Arc, Mutex};

use custom_error::CustomError;
use rxr_core::{
    teardown::{Subscription, Teardown},
    TeardownError,
};

fn record(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Teardown {
    let log = Arc::clone(log);
    Teardown::logic(move || log.lock().unwrap().push(name))
}

#[test]
fn failing_child_does_not_stop_siblings() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let parent = Subscription::new();

    parent.add(record(&log, "first")).unwrap();
    parent
        .add(Teardown::fallible(|| Err(CustomError("second child").into())))
        .unwrap();
    parent.add(record(&log, "third")).unwrap();

    let e = parent.close().unwrap_err();

    assert_eq!(*log.lock().unwrap(), vec!["first", "third"]);
    assert_eq!(e.len(), 1);
    match &e.errors()[0] {
        TeardownError::Failed(source) => {
            assert_eq!(source.to_string(), "custom error occurred: second child");
        }
        other => panic!("unexpected teardown error {:?}", other),
    }
    assert!(e.to_string().contains("second child"));
}

#[test]
fn panicking_nested_subscription_is_aggregated() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let parent = Subscription::new();

    let first = Subscription::new();
    first.add(record(&log, "first")).unwrap();

    let second = Subscription::new();
    second
        .add(Teardown::logic(|| panic!("second child panicked")))
        .unwrap();

    let third = Subscription::new();
    third.add(record(&log, "third")).unwrap();

    parent.add(first.clone()).unwrap();
    parent.add(second.clone()).unwrap();
    parent.add(third.clone()).unwrap();

    let e = parent.close().unwrap_err();

    assert!(first.is_closed() && second.is_closed() && third.is_closed());
    assert_eq!(*log.lock().unwrap(), vec!["first", "third"]);
    assert!(matches!(
        &e.errors()[0],
        TeardownError::Panicked { message } if message == "second child panicked"
    ));

    // Second close reports nothing and runs nothing.
    assert!(parent.close().is_ok());
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn already_closed_children_are_tolerated() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let parent = Subscription::new();
    let child = Subscription::new();
    child.add(record(&log, "child")).unwrap();

    parent.add(child.clone()).unwrap();
    child.close().unwrap();
    parent.close().unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["child"]);
}

#[test]
fn child_added_after_close_is_torn_down() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let parent = Subscription::new();
    parent.close().unwrap();

    let child = Subscription::new();
    child.add(record(&log, "late child")).unwrap();
    parent.add(child.clone()).unwrap();

    assert!(child.is_closed());
    assert_eq!(*log.lock().unwrap(), vec!["late child"]);
}

#[test]
fn concurrent_close_runs_teardown_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let s = Subscription::new();
    s.add(record(&log, "once")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let s = s.clone();
            std::thread::spawn(move || s.close())
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap().is_ok());
    }

    assert_eq!(*log.lock().unwrap(), vec!["once"]);
}
