//! The `empty` observable can deliver its completion through a scheduler.
//! Here a `VirtualTimeScheduler` holds the completion until the virtual clock
//! is moved forward, and a second subscription is cancelled before that
//! happens, so its subscriber is never notified.
//!
//! The same observable is then run on a `TokioScheduler`.
//!
//! To run this example, execute `cargo run --example scheduled_empty`.

use std::{sync::Arc, time::Duration};

use rxr_core::{
    scheduler::{TokioScheduler, VirtualTimeScheduler},
    subscribe::Handlers,
    Observable, Subscribeable,
};

#[tokio::main]
async fn main() {
    let scheduler = VirtualTimeScheduler::new();
    let observable = Observable::<i32>::empty_on(Arc::new(scheduler.clone()));

    let first = observable.subscribe(Handlers::<i32>::new().complete(|| println!("First completed")));
    let second = observable.subscribe(Handlers::<i32>::new().complete(|| println!("Second completed")));

    // Nothing ran yet.
    println!("Pending actions: {}", scheduler.pending());

    // Cancel the second subscription before the scheduler gets to it.
    second.close().unwrap();

    let ran = scheduler.advance_by(Duration::ZERO);
    println!("Actions run: {}, first closed: {}", ran, first.is_closed());

    let tokio_scheduler = TokioScheduler::new().unwrap();
    let observable = Observable::<i32>::empty_on(Arc::new(tokio_scheduler));
    let subscription =
        observable.subscribe(Handlers::<i32>::new().complete(|| println!("Completed on Tokio")));

    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("Tokio subscription closed: {}", subscription.is_closed());
}
