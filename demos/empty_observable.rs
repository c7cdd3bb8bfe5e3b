//! The `empty` observable emits no values and completes as soon as it is
//! subscribed to. Without a scheduler the completion happens before
//! `subscribe` returns, so the returned `Subscription` is already closed.
//!
//! To run this example, execute `cargo run --example empty_observable`.

use rxr_core::{subscribe::Subscriber, Observable, Subscribeable};

fn main() {
    let observable = Observable::<i32>::empty();

    let subscriber = Subscriber::new(
        |v: i32| println!("Emitted {}", v),
        |e| eprintln!("Error {}", e),
        || println!("Completed"),
    );

    let subscription = observable.subscribe(subscriber);

    // Closing an already closed subscription does nothing.
    println!("Closed: {}", subscription.is_closed());
    subscription.close().unwrap();
}
