use crate::config::TasksConfig;
use std::future::Future;
use std::io;
use std::panic;
use std::pin::Pin;
use tokio::runtime::{Builder, Runtime};

/// A task runner using [tokio] as runtime.
#[derive(Debug)]
pub struct TokioRunner {
    rt: Runtime,
}

impl TokioRunner {
    /// Builds the runtime described by `config`.
    pub(crate) fn new(config: TasksConfig) -> io::Result<Self> {
        // Nothing drives the runtime with `block_on`, so even a single worker
        // needs its own thread for detached renders to make progress.
        let workers = config.workers.get();
        let rt = Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .thread_stack_size(config.stack_size)
            .thread_name("levelup-render")
            .build()?;

        log::debug!("Started tokio task runner with {} worker(s)", workers);
        Ok(Self { rt })
    }

    pub(crate) fn block_on<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        self.rt.block_on(fut)
    }

    pub(crate) fn spawn_detached<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.rt.spawn(fut));
    }

    /// Runs `f` on the blocking pool. A panic in `f` resumes in the caller.
    pub(crate) fn spawn_blocking<F, R>(&self, f: F) -> Pin<Box<dyn Future<Output = R> + Send>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let handle = self.rt.spawn_blocking(f);
        Box::pin(async move {
            match handle.await {
                Ok(value) => value,
                Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
                Err(e) => panic!("Blocking task was dropped by the runtime: {}", e),
            }
        })
    }

    /// Stops the runtime without waiting for blocking renders to return.
    pub(crate) fn shutdown(self) {
        self.rt.shutdown_background();
    }
}
