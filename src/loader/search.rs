//! At-most-one-active-search bookkeeping
//!
//! Every search takes a new generation and a child of the caller's token.
//! Starting a search cancels the token of the one before it, whose result is
//! then discarded.

use std::sync::Mutex;

use crate::core::cancel::CancellationToken;
use crate::core::sync::lock_recover;

#[derive(Default)]
struct Current {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Ticket held by a running search
#[derive(Debug, Clone)]
pub(crate) struct SearchTicket {
    pub generation: u64,
    pub token: CancellationToken,
    /// Whether starting this search cancelled a running one
    pub superseded_previous: bool,
}

#[derive(Default)]
pub(crate) struct SearchSlot {
    current: Mutex<Current>,
}

impl SearchSlot {
    fn lock(&self) -> std::sync::MutexGuard<'_, Current> {
        lock_recover(self.current.lock(), "SearchSlot::current")
    }

    /// Start a new search, superseding the running one
    pub fn begin(&self, cancel: &CancellationToken) -> SearchTicket {
        let mut current = self.lock();
        let superseded_previous = match current.token.take() {
            Some(previous) if !previous.is_cancelled() => {
                previous.cancel();
                true
            }
            _ => false,
        };
        current.generation += 1;
        let token = cancel.child_token();
        current.token = Some(token.clone());
        SearchTicket {
            generation: current.generation,
            token,
            superseded_previous,
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        self.lock().generation == ticket.generation && !ticket.token.is_cancelled()
    }

    /// Release the slot if `ticket` still holds it
    pub fn finish(&self, ticket: &SearchTicket) {
        let mut current = self.lock();
        if current.generation == ticket.generation {
            current.token = None;
        }
    }

    /// Cancel whatever search is running
    pub fn cancel(&self) {
        if let Some(token) = self.lock().token.take() {
            token.cancel();
        }
    }
}
