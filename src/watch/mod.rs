//! Change-notification subscription.
//!
//! Some stores cancel a pending notification as soon as the thread that
//! requested it exits. On those, requests are funnelled through a single
//! long-lived [`DedicatedThreadPool`] worker; everywhere else they are armed
//! in place. [`select_notifier`] chooses between the two.

mod dedicated;
mod notifier;

#[cfg(test)]
mod tests;

pub use dedicated::{DedicatedThreadLease, DedicatedThreadPool, WORKER_STACK_SIZE, WORKER_THREAD_NAME};
pub use notifier::{
    ChangeNotifier, DedicatedThreadNotifier, Subscription, ThreadAgnosticNotifier, select_notifier,
};
