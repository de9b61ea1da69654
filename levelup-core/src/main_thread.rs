//! The coordinating thread.
//!
//! Loaders and views keep their bookkeeping on one thread. [MainThread] is
//! bound to the thread that created it and owns a local executor: futures
//! spawned on it never leave that thread, so state they capture does not
//! have to be `Send`. Background work hands results back by sending them
//! through a channel that a local task drains.

use smol::LocalExecutor;
use std::future::Future;
use std::rc::Rc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Handle to the coordinating thread's executor.
///
/// Cloning is cheap; all clones drive the same executor.
#[derive(Clone)]
pub struct MainThread {
    executor: Rc<LocalExecutor<'static>>,
    thread: ThreadId,
}

impl MainThread {
    /// Binds a new coordinating executor to the current thread.
    pub fn new() -> Self {
        Self {
            executor: Rc::new(LocalExecutor::new()),
            thread: thread::current().id(),
        }
    }

    /// The id of the bound thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Returns `true` when called from the bound thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Panics unless called from the bound thread.
    #[track_caller]
    pub fn assert_current(&self, operation: &str) {
        assert!(
            self.is_current(),
            "{} must be called on the main thread ({:?}), called from {:?}",
            operation,
            self.thread,
            thread::current().id()
        );
    }

    /// Spawns a future that only ever runs on the bound thread.
    pub fn spawn_local<F>(&self, fut: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.executor.spawn(fut).detach();
    }

    /// Runs every local task that is ready without waiting.
    ///
    /// Returns the number of tasks polled.
    pub fn run_pending(&self) -> usize {
        self.assert_current("MainThread::run_pending");
        let mut polled = 0;
        while self.executor.try_tick() {
            polled += 1;
        }
        polled
    }

    /// Drives local tasks until `fut` completes.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.assert_current("MainThread::block_on");
        smol::block_on(self.executor.run(fut))
    }

    /// Drives local tasks until `done` returns `true` or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.block_on(async {
            loop {
                if done() {
                    return true;
                }
                if Instant::now() >= deadline {
                    return false;
                }
                smol::Timer::after(Duration::from_millis(1)).await;
            }
        })
    }
}

impl Default for MainThread {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MainThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThread")
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}
