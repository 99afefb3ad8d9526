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

//! Cross-thread queue of deferred render work.
//!
//! Any thread may [`RenderScheduler::schedule`] a closure, the render thread drains the queue
//! exactly once per frame with [`RenderScheduler::run`] before any pass is drawn. This is the
//! only way non-render threads (physics, gameplay) are allowed to touch render state.

use std::sync::atomic::{AtomicBool, Ordering};
use umbra_core::{err, parking_lot::Mutex};

pub type ScheduledAction<C> = Box<dyn FnOnce(&mut C) + Send>;

pub struct RenderScheduler<C> {
    actions: Mutex<Vec<ScheduledAction<C>>>,
    running: AtomicBool,
}

impl<C> Default for RenderScheduler<C> {
    fn default() -> Self {
        Self {
            actions: Default::default(),
            running: AtomicBool::new(false),
        }
    }
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C> RenderScheduler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action to the queue. Can be called from any thread, including from an action
    /// that is being executed, in that case the new action runs on the next [`Self::run`].
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.actions.lock().push(Box::new(action));
    }

    /// Executes every queued action in the order they were scheduled and returns how many were
    /// executed. The queue lock is released before the first action runs.
    pub fn run(&self, context: &mut C) -> usize {
        if self
            .running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            err!("RenderScheduler::run was called while the scheduler is already running!");
            return 0;
        }
        let _flag = RunningFlag(&self.running);

        let actions = std::mem::take(&mut *self.actions.lock());
        let count = actions.len();
        for action in actions {
            action(context);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.actions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{sync::Arc, thread};

    #[derive(Default)]
    struct Context {
        values: Vec<usize>,
        scheduler: Arc<RenderScheduler<Context>>,
    }

    #[test]
    fn test_fifo_order() {
        let scheduler = RenderScheduler::<Vec<usize>>::new();
        for i in 0..5 {
            scheduler.schedule(move |values| values.push(i));
        }
        assert_eq!(scheduler.len(), 5);

        let mut values = Vec::new();
        assert_eq!(scheduler.run(&mut values), 5);
        assert_eq!(values, [0, 1, 2, 3, 4]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.run(&mut values), 0);
    }

    #[test]
    fn test_concurrent_producers() {
        let scheduler = Arc::new(RenderScheduler::<Vec<usize>>::new());

        let producers = (0..4)
            .map(|producer| {
                let scheduler = scheduler.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        scheduler.schedule(move |values| values.push(producer * 1000 + i));
                    }
                })
            })
            .collect::<Vec<_>>();

        let mut values = Vec::new();
        while values.len() < 1000 {
            scheduler.run(&mut values);
            thread::yield_now();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        scheduler.run(&mut values);

        assert_eq!(values.len(), 1000);
        // Each producer's actions keep their relative order.
        for producer in 0..4 {
            let own = values
                .iter()
                .filter(|v| **v / 1000 == producer)
                .copied()
                .collect::<Vec<_>>();
            assert_eq!(own, (0..250).map(|i| producer * 1000 + i).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_nested_scheduling_runs_next_time() {
        let mut context = Context::default();
        context.scheduler.schedule(|ctx: &mut Context| {
            ctx.values.push(1);
            ctx.scheduler.schedule(|ctx: &mut Context| ctx.values.push(2));
        });

        let scheduler = context.scheduler.clone();
        assert_eq!(scheduler.run(&mut context), 1);
        assert_eq!(context.values, [1]);
        assert_eq!(scheduler.len(), 1);

        assert_eq!(scheduler.run(&mut context), 1);
        assert_eq!(context.values, [1, 2]);
    }

    #[test]
    fn test_reentrant_run_is_refused() {
        let mut context = Context::default();
        context.scheduler.schedule(|ctx: &mut Context| {
            ctx.scheduler.schedule(|ctx: &mut Context| ctx.values.push(7));
            let scheduler = ctx.scheduler.clone();
            assert_eq!(scheduler.run(ctx), 0);
        });

        let scheduler = context.scheduler.clone();
        assert_eq!(scheduler.run(&mut context), 1);
        assert!(context.values.is_empty());
        assert_eq!(scheduler.run(&mut context), 1);
        assert_eq!(context.values, [7]);
    }
}
