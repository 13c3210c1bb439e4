//! Event objects and their bridge into async code.
//!
//! Change notifications signal a [`ManualResetEvent`]. The reload loop never
//! blocks a thread on it; it awaits the event through [`wait_for_signal`],
//! which can time out or be cancelled.

mod event;
mod wait;

#[cfg(test)]
mod tests;

pub use event::{ManualResetEvent, RegisteredWait};
pub use wait::wait_for_signal;
