//! Provides structures and traits related to subscription management.
//!
//! This module includes `Subscriber` for handling observed values, errors and
//! completion, and `Subscription` for releasing the resources of a
//! subscription exactly once.
//!
//! Additionally, it defines the `Teardown` units a subscription owns and the
//! `Subscribeable` trait implemented by observables.
pub mod subscribe;
pub mod teardown;
