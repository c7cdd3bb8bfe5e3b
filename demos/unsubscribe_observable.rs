//! This `Observable` emits values from an OS thread until it is unsubscribed.
//! The teardown returned from the subscribe logic signals the thread to stop,
//! and runs exactly once even though the subscription is closed twice.
//!
//! A failing teardown does not stop the others from running; every failure
//! is collected into the error returned by `close`.
//!
//! To run this example, execute `cargo run --example unsubscribe_observable`.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use rxr_core::{
    subscribe::Subscriber,
    teardown::{Subscription, Teardown},
    Observable, Observer, Subscribeable,
};

fn main() {
    let observable = Observable::new(|mut o: Subscriber<u32>| {
        let done = Arc::new(AtomicBool::new(false));
        let done_c = Arc::clone(&done);

        std::thread::spawn(move || {
            let mut i = 0;
            while !done_c.load(Ordering::Acquire) {
                o.next(i);
                i += 1;
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        Teardown::logic(move || {
            println!("Stopping producer");
            done.store(true, Ordering::Release);
        })
    });

    let subscription = observable.subscribe(Subscriber::on_next(|v: u32| println!("Emitted {}", v)));
    std::thread::sleep(Duration::from_millis(30));

    subscription.close().unwrap();
    subscription.close().unwrap();

    // Teardown failures are collected, siblings still run.
    let parent = Subscription::new();
    parent.add(Teardown::logic(|| println!("First teardown"))).unwrap();
    parent
        .add(Teardown::fallible(|| Err("second teardown failed".into())))
        .unwrap();
    parent.add(Teardown::logic(|| println!("Third teardown"))).unwrap();

    if let Err(e) = parent.close() {
        eprintln!("{}", e);
    }
}
