use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// A one-shot deadline that can be armed, re-armed and cancelled.
///
/// [`Deadline::expired`] never completes while disarmed, so it can sit in a
/// `select!` loop unconditionally.
#[derive(Debug, Default)]
pub(crate) struct Deadline {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    pub fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(sleep(after)));
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolve when the deadline passes, disarming it.
    pub async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => pending().await,
        }
    }
}
