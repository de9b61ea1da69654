//! Task runner implementations.
#[cfg(feature = "tokio-runner")]
use self::tokio_runner::TokioRunner;
use std::future::Future;
use std::pin::Pin;

/// An abstraction over a task runner.
#[derive(Debug)]
pub enum TaskRunner {
    /// The tokio task runner.
    #[cfg(feature = "tokio-runner")]
    Tokio(TokioRunner),
    /// No runtime selected; detached tasks go to the global `smol` executor.
    None,
}

impl TaskRunner {
    /// Blocks on the given future.
    pub fn block_on<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        match self {
            #[cfg(feature = "tokio-runner")]
            TaskRunner::Tokio(runner) => runner.block_on(fut),
            TaskRunner::None => {
                // Since there is no runtime, we can just block on the future using pollster.
                pollster::block_on(fut)
            },
        }
    }

    /// Spawns the given future without waiting for it.
    pub fn spawn_detached<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            #[cfg(feature = "tokio-runner")]
            TaskRunner::Tokio(runner) => runner.spawn_detached(fut),
            TaskRunner::None => smol::spawn(fut).detach(),
        }
    }

    /// Spawns the given blocking function.
    ///
    /// The returned future does not borrow the runner.
    pub fn spawn_blocking<F, R>(&self, f: F) -> Pin<Box<dyn Future<Output = R> + Send>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            #[cfg(feature = "tokio-runner")]
            TaskRunner::Tokio(runner) => runner.spawn_blocking(f),
            TaskRunner::None => Box::pin(smol::unblock(f)),
        }
    }

    /// Shuts the runner down, dropping any runtime it owns.
    pub fn shutdown(self) {
        match self {
            #[cfg(feature = "tokio-runner")]
            TaskRunner::Tokio(runner) => runner.shutdown(),
            TaskRunner::None => {},
        }
    }
}

/// The tokio-backed task runner.
#[cfg(feature = "tokio-runner")]
pub mod tokio_runner;
