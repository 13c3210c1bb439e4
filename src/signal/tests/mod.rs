//! Unit tests for the signal module.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::{thread, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::core::RegistryError;
use crate::signal::{ManualResetEvent, wait_for_signal};

#[test]
fn event_starts_unsignaled() {
    let event = ManualResetEvent::new();
    assert!(!event.is_set());
}

#[test]
fn event_stays_set_until_reset() {
    let event = ManualResetEvent::new();
    event.set();
    assert!(event.is_set());
    assert!(event.is_set());

    event.reset();
    assert!(!event.is_set());
}

#[test]
fn blocking_wait_times_out() {
    let event = ManualResetEvent::new();
    assert!(!event.wait_timeout(Duration::from_millis(20)));
}

#[test]
fn blocking_wait_wakes_on_set_from_other_thread() {
    let event = ManualResetEvent::new();
    let setter = event.clone();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        setter.set();
    });

    assert!(event.wait_timeout(Duration::from_secs(5)));
    handle.join().unwrap();
}

#[test]
fn registration_on_signaled_event_is_not_kept() {
    let event = ManualResetEvent::new();
    event.set();

    let registration = event.register_wait();
    assert!(!registration.is_registered());
    assert_eq!(event.registered_waits(), 0);
}

#[test]
fn dropping_registration_unregisters() {
    let event = ManualResetEvent::new();
    let registration = event.register_wait();
    assert_eq!(event.registered_waits(), 1);

    drop(registration);
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn already_signaled_resolves_true() {
    let event = ManualResetEvent::new();
    event.set();

    let token = CancellationToken::new();
    assert!(wait_for_signal(&event, None, Some(&token)).await.unwrap());
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn zero_timeout_resolves_false_without_registering() {
    let event = ManualResetEvent::new();

    let signaled = wait_for_signal(&event, Some(Duration::ZERO), None)
        .await
        .unwrap();

    assert!(!signaled);
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn timeout_resolves_false_and_releases_registration() {
    let event = ManualResetEvent::new();

    let signaled = wait_for_signal(&event, Some(Duration::from_millis(20)), None)
        .await
        .unwrap();

    assert!(!signaled);
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn signal_from_another_thread_resolves_true() {
    let event = ManualResetEvent::new();
    let setter = event.clone();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        setter.set();
    });

    let token = CancellationToken::new();
    let signaled = wait_for_signal(&event, Some(Duration::from_secs(5)), Some(&token))
        .await
        .unwrap();

    assert!(signaled);
    assert_eq!(event.registered_waits(), 0);
    handle.join().unwrap();
}

#[tokio::test]
async fn cancellation_resolves_cancelled_and_releases_registration() {
    let event = ManualResetEvent::new();
    let token = CancellationToken::new();
    let canceller = token.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let result = wait_for_signal(&event, None, Some(&token)).await;

    assert_eq!(result, Err(RegistryError::Cancelled));
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn pre_cancelled_token_does_not_register() {
    let event = ManualResetEvent::new();
    let token = CancellationToken::new();
    token.cancel();

    let result = wait_for_signal(&event, None, Some(&token)).await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(event.registered_waits(), 0);
}

#[tokio::test]
async fn signaled_event_wins_over_cancelled_token() {
    let event = ManualResetEvent::new();
    event.set();
    let token = CancellationToken::new();
    token.cancel();

    assert!(wait_for_signal(&event, None, Some(&token)).await.unwrap());
}

#[tokio::test]
async fn abandoned_wait_releases_registration() {
    let event = ManualResetEvent::new();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        wait_for_signal(&event, None, None),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(event.registered_waits(), 0);
}
