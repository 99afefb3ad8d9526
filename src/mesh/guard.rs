// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Tracks whether a traversal of the mesh registry is in flight.
//!
//! The epoch counter is odd while a traversal is running and even otherwise, so a waiting thread
//! can tell that the traversal it waited for has finished even if another one started right
//! after.

use std::thread::{self, ThreadId};
use umbra_core::parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct GuardState {
    depth: usize,
    owner: Option<ThreadId>,
    epoch: u64,
}

#[derive(Default)]
pub struct TraversalGuard {
    state: Mutex<GuardState>,
    finished: Condvar,
}

pub(crate) enum WaitOutcome {
    /// No traversal was running, or the one that was running has finished.
    Idle,
    /// The caller itself is traversing, waiting would deadlock.
    OwnedByCaller,
}

impl TraversalGuard {
    /// Starts a traversal on the current thread, nested traversals on the owning thread are
    /// allowed. A different thread blocks until the running traversal finishes.
    pub fn begin(&self) {
        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                Some(owner) if owner == current => break,
                Some(_) => self.finished.wait(&mut state),
                None => {
                    state.owner = Some(current);
                    state.epoch += 1;
                    break;
                }
            }
        }
        state.depth += 1;
    }

    /// Ends a traversal. `on_idle` runs while the guard is still locked when the outermost
    /// traversal ends, waiters are woken up after it returns.
    pub fn end(&self, on_idle: impl FnOnce()) {
        let mut state = self.state.lock();
        debug_assert!(state.depth > 0);
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            on_idle();
            state.epoch += 1;
            drop(state);
            self.finished.notify_all();
        }
    }

    /// Blocks until no traversal is running on another thread, then calls `func` while still
    /// holding the guard, so no traversal can start until it returns.
    pub(crate) fn exclusive<R>(&self, func: impl FnOnce(WaitOutcome) -> R) -> R {
        let current = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => return func(WaitOutcome::Idle),
                Some(owner) if owner == current => return func(WaitOutcome::OwnedByCaller),
                Some(_) => {
                    let epoch = state.epoch;
                    while state.epoch == epoch {
                        self.finished.wait(&mut state);
                    }
                }
            }
        }
    }

    /// Calls `func` only if no traversal is running. The guard stays locked while `func` runs,
    /// so a traversal cannot start in the meantime.
    pub(crate) fn when_idle<R>(&self, func: impl FnOnce() -> R) -> Option<R> {
        let state = self.state.lock();
        if state.owner.is_some() {
            return None;
        }
        let result = func();
        drop(state);
        Some(result)
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().epoch % 2 == 1
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[test]
    fn test_epoch_parity() {
        let guard = TraversalGuard::default();
        assert!(!guard.is_in_flight());
        guard.begin();
        guard.begin();
        assert!(guard.is_in_flight());
        assert_eq!(guard.epoch(), 1);
        guard.end(|| panic!("still nested"));
        let mut idle = false;
        guard.end(|| idle = true);
        assert!(idle);
        assert!(!guard.is_in_flight());
        assert_eq!(guard.epoch(), 2);
        assert!(guard.exclusive(|outcome| matches!(outcome, WaitOutcome::Idle)));
    }

    #[test]
    fn test_owner_does_not_wait_for_itself() {
        let guard = TraversalGuard::default();
        guard.begin();
        assert!(guard.exclusive(|outcome| matches!(outcome, WaitOutcome::OwnedByCaller)));
        guard.end(|| ());
    }

    #[test]
    fn test_other_thread_waits() {
        let guard = Arc::new(TraversalGuard::default());
        let finished = Arc::new(AtomicBool::new(false));
        guard.begin();

        let waiter = {
            let guard = guard.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                guard.exclusive(|_| assert!(finished.load(Ordering::SeqCst)));
            })
        };

        thread::sleep(Duration::from_millis(20));
        finished.store(true, Ordering::SeqCst);
        guard.end(|| ());
        waiter.join().unwrap();
    }

    #[test]
    fn test_traversal_cannot_start_while_idle_work_runs() {
        let guard = Arc::new(TraversalGuard::default());
        let started = Arc::new(AtomicBool::new(false));

        let traversal = guard.when_idle(|| {
            let traversal = {
                let guard = guard.clone();
                let started = started.clone();
                thread::spawn(move || {
                    guard.begin();
                    started.store(true, Ordering::SeqCst);
                    guard.end(|| ());
                })
            };
            thread::sleep(Duration::from_millis(20));
            assert!(!started.load(Ordering::SeqCst));
            traversal
        });
        traversal.unwrap().join().unwrap();
        assert!(started.load(Ordering::SeqCst));

        guard.begin();
        assert!(guard.when_idle(|| ()).is_none());
        guard.end(|| ());
    }
}
