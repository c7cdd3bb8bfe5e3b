#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rxr_core::subscribe::Subscriber;

/// Counters shared by every subscriber made through `make_subscriber`.
#[derive(Clone, Default)]
pub struct Emissions {
    pub nexts: Arc<Mutex<Vec<i32>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
    pub completes: Arc<Mutex<usize>>,
}

impl Emissions {
    pub fn nexts(&self) -> Vec<i32> {
        self.nexts.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn completes(&self) -> usize {
        *self.completes.lock().unwrap()
    }

    pub fn terminals(&self) -> usize {
        self.errors().len() + self.completes()
    }
}

pub fn register_emissions_subscriber() -> (impl Fn() -> Subscriber<i32>, Emissions) {
    let emissions = Emissions::default();
    let e = emissions.clone();

    let make_subscriber = move || {
        let nexts_c = Arc::clone(&e.nexts);
        let errors_c = Arc::clone(&e.errors);
        let completes_c = Arc::clone(&e.completes);

        Subscriber::new(
            move |n| {
                // Track next() calls.
                nexts_c.lock().unwrap().push(n);
            },
            move |err| {
                // Track error() calls.
                errors_c.lock().unwrap().push(err.to_string());
            },
            move || {
                // Track complete() calls.
                *completes_c.lock().unwrap() += 1;
            },
        )
    };
    (make_subscriber, emissions)
}
