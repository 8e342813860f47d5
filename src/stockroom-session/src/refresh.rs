//! Single-flight coordination of access-token refreshes.
//!
//! Any number of callers may ask for a refresh at the same time; they all
//! await one shared future, so the server sees a single refresh request.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

type InFlight = Shared<BoxFuture<'static, bool>>;

/// Coalesces overlapping refresh attempts into one in-flight operation.
#[derive(Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the refresh in flight, or start one with `start`.
    ///
    /// `start` is only called when no refresh is running. Once the shared
    /// refresh resolves, the next call starts a fresh one.
    pub async fn run<F>(&self, start: F) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, bool>,
    {
        let refresh = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let refresh = start().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        // Cleared on drop so a panicking refresh does not stay in the slot.
        let _clear = ClearOnDrop {
            slot: &self.in_flight,
            refresh: refresh.clone(),
        };
        refresh.await
    }

    /// Whether a refresh is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }
}

/// Empties the in-flight slot if it still holds `refresh`.
struct ClearOnDrop<'a> {
    slot: &'a Mutex<Option<InFlight>>,
    refresh: InFlight,
}

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&self.refresh))
        {
            *slot = None;
        }
    }
}
