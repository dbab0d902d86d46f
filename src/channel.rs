//! Button press queue shared between the host and the running sketch.
//!
//! The host may press buttons from any thread (an input reader, a UI
//! callback). Presses are queued in a fixed-size `heapless::Deque` behind a
//! critical section and drained by the run at its suspension points.

use core::cell::RefCell;
use std::sync::Arc;

use critical_section::Mutex;
use heapless::Deque;

/// Index of a button in the per-run registry
pub type ButtonId = usize;

/// Maximum number of presses waiting to be dispatched
pub const CLICK_QUEUE_SIZE: usize = 16;

/// Error returned when trying to send to a full channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrySendError<T>(pub T);

/// A bounded, thread-safe FIFO.
pub struct Channel<T, const SIZE: usize> {
    inner: Mutex<RefCell<Deque<T, SIZE>>>,
}

impl<T, const SIZE: usize> Channel<T, SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Returns `Err(TrySendError(value))` if the channel is full.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            queue.push_back(value).map_err(TrySendError)
        })
    }

    pub fn try_receive(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().pop_front())
    }

    /// Drop everything still queued
    pub fn clear(&self) {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().clear());
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().is_empty())
    }
}

impl<T, const SIZE: usize> Default for Channel<T, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

pub type ClickChannel = Channel<ButtonId, CLICK_QUEUE_SIZE>;

/// Host-side handle used to press on-screen buttons
#[derive(Clone)]
pub struct ClickSender {
    channel: Arc<ClickChannel>,
}

impl ClickSender {
    pub(crate) fn new(channel: Arc<ClickChannel>) -> Self {
        Self { channel }
    }

    /// Queue a press of `button`
    ///
    /// Presses addressed to unknown buttons are ignored when dispatched.
    pub fn press(&self, button: ButtonId) -> Result<(), TrySendError<ButtonId>> {
        self.channel.try_send(button)
    }
}
