//! Long-poll change notification.
//!
//! [`NotificationState`] tracks the last seen notification id per namespace,
//! [`PollLoop`] drives one application against the server, and [`Watcher`]
//! runs the loops of many applications with shared [`Listeners`].

pub mod failure_window;
pub mod listener;
pub mod poll_loop;
pub mod state;
pub mod watcher;

pub use failure_window::{FailureWindow, StormPolicy};
pub use listener::{ConfigChange, Listeners, RawResponse};
pub use poll_loop::{CycleOutcome, PollLoop};
pub(crate) use poll_loop::{PollContext, system_clock};
pub use state::{
    Notification, NotificationChange, NotificationState, UNSEEN_NOTIFICATION_ID,
    app_notice_mapping, notice_mapping,
};
pub use watcher::{ScheduleMode, WatchControl, WatchHandle, Watcher};
