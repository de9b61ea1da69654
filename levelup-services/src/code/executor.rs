// SPDX-License-Identifier: LGPL-3.0-only

//! Background render scheduling for code loaders.

use crate::code::cache::CodeCache;
use crate::code::error::CodeError;
use crate::code::generator::CodeGenerator;
use crate::code::key::LoadKey;
use futures::future::{self, Either};
use levelup_core::config::LoaderConfig;
use levelup_core::tasks;
use smol::channel::Sender;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A render the loader wants started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    /// The content to encode.
    pub content: String,
    /// Key derived from the content.
    pub key: LoadKey,
}

/// A finished render travelling back to the main thread.
#[derive(Debug)]
pub struct Completion<T> {
    /// Key of the finished request.
    pub key: LoadKey,
    /// The rendered image or the reason there is none.
    pub result: Result<T, CodeError>,
}

/// Sends render results back to the loader that requested them.
///
/// Usable from any thread. The loader applies the result on the main
/// thread.
pub struct CompletionSink<T> {
    tx: Sender<Completion<T>>,
}

impl<T> CompletionSink<T> {
    pub(crate) fn new(tx: Sender<Completion<T>>) -> Self {
        Self { tx }
    }

    /// Hand a result back. Returns `false` if the loader no longer exists.
    pub fn complete(&self, key: LoadKey, result: Result<T, CodeError>) -> bool {
        self.tx.try_send(Completion { key, result }).is_ok()
    }
}

impl<T> Clone for CompletionSink<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

/// Starts and cancels renders on behalf of a loader.
///
/// All methods are called on the main thread. Implementations decide where
/// the work runs and must report every result they still care about
/// through the sink.
pub trait RenderScheduler<T> {
    /// Begin rendering `request`.
    fn start_render(&self, request: RenderRequest, sink: CompletionSink<T>);

    /// Best-effort abort of the render for `key`.
    fn cancel_render(&self, key: &LoadKey);

    /// Best-effort abort of every render.
    fn cancel_all_renders(&self);
}

/// Renders on the background task runner and caches what it renders.
///
/// Cancelled renders still run to completion and are still cached; only
/// the hand-off to the loader is skipped.
pub struct BackgroundRenderer<T> {
    generator: Arc<dyn CodeGenerator<T>>,
    cache: Arc<dyn CodeCache<T>>,
    timeout: Option<Duration>,
    in_flight: RefCell<HashMap<LoadKey, Arc<AtomicBool>>>,
}

impl<T: Clone + Send + Sync + 'static> BackgroundRenderer<T> {
    /// Create a renderer without a timeout.
    pub fn new(generator: Arc<dyn CodeGenerator<T>>, cache: Arc<dyn CodeCache<T>>) -> Self {
        Self {
            generator,
            cache,
            timeout: None,
            in_flight: RefCell::new(HashMap::new()),
        }
    }

    /// Create a renderer using the timeout from `config`.
    pub fn from_config(
        generator: Arc<dyn CodeGenerator<T>>,
        cache: Arc<dyn CodeCache<T>>,
        config: &LoaderConfig,
    ) -> Self {
        Self::new(generator, cache).with_timeout(config.render_timeout())
    }

    /// Fail renders that take longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of renders whose workers have not finished yet.
    pub fn active_renders(&self) -> usize {
        self.in_flight
            .borrow()
            .values()
            .filter(|flag| Arc::strong_count(flag) > 1)
            .count()
    }

    /// Runs the generator on the blocking pool, bounded by `timeout`.
    ///
    /// A render that times out keeps running; its result is still cached
    /// when it arrives so that a retry is a cache hit.
    async fn render(
        generator: Arc<dyn CodeGenerator<T>>,
        cache: Arc<dyn CodeCache<T>>,
        request: RenderRequest,
        timeout: Option<Duration>,
    ) -> Result<T, CodeError> {
        let RenderRequest { content, key } = request;
        let work = Box::pin(tasks::spawn_blocking(move || generate_guarded(&*generator, &content)));

        let result = match timeout {
            None => work.await,
            Some(limit) => match future::select(work, smol::Timer::after(limit)).await {
                Either::Left((result, _)) => result,
                Either::Right((_, work)) => {
                    let late_key = key.clone();
                    let late_cache = cache.clone();
                    tasks::spawn(async move {
                        if let Ok(image) = work.await {
                            log::debug!("Caching late render for {}", late_key);
                            late_cache.put(late_key, image);
                        }
                    });
                    Err(CodeError::Timeout(limit))
                },
            },
        };

        match &result {
            Ok(image) => {
                cache.put(key.clone(), image.clone());
                log::info!("Code rendered and cached: {}", key);
            },
            Err(CodeError::Timeout(limit)) => {
                log::warn!("Code render for {} timed out after {:?}", key, limit);
            },
            Err(e) => log::error!("Code render for {} failed: {}", key, e),
        }

        result
    }
}

impl<T: Clone + Send + Sync + 'static> RenderScheduler<T> for BackgroundRenderer<T> {
    fn start_render(&self, request: RenderRequest, sink: CompletionSink<T>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut in_flight = self.in_flight.borrow_mut();
            in_flight.retain(|_, flag| Arc::strong_count(flag) > 1);
            in_flight.insert(request.key.clone(), cancelled.clone());
        }

        let generator = self.generator.clone();
        let cache = self.cache.clone();
        let timeout = self.timeout;
        let key = request.key.clone();

        log::debug!("Queueing code render for {}", key);

        tasks::spawn(async move {
            let result = Self::render(generator, cache, request, timeout).await;

            if cancelled.load(Ordering::Acquire) {
                log::debug!("Render for {} was cancelled, dropping result", key);
                return;
            }

            if !sink.complete(key.clone(), result) {
                log::debug!("Loader for {} is gone, dropping result", key);
            }
        });
    }

    fn cancel_render(&self, key: &LoadKey) {
        if let Some(flag) = self.in_flight.borrow_mut().remove(key) {
            flag.store(true, Ordering::Release);
        }
    }

    fn cancel_all_renders(&self) {
        for (_, flag) in self.in_flight.borrow_mut().drain() {
            flag.store(true, Ordering::Release);
        }
    }
}

/// Renders synchronously on the calling thread.
///
/// For tools and tests that want deterministic results without a worker
/// pool. The result still reaches the loader through the main thread's
/// executor, never from inside `get_code`.
pub struct InlineRenderer<T> {
    generator: Arc<dyn CodeGenerator<T>>,
    cache: Arc<dyn CodeCache<T>>,
}

impl<T> InlineRenderer<T> {
    /// Create an inline renderer.
    pub fn new(generator: Arc<dyn CodeGenerator<T>>, cache: Arc<dyn CodeCache<T>>) -> Self {
        Self { generator, cache }
    }
}

impl<T: Clone> RenderScheduler<T> for InlineRenderer<T> {
    fn start_render(&self, request: RenderRequest, sink: CompletionSink<T>) {
        let result = generate_guarded(&*self.generator, &request.content);
        if let Ok(image) = &result {
            self.cache.put(request.key.clone(), image.clone());
        }
        sink.complete(request.key, result);
    }

    fn cancel_render(&self, _key: &LoadKey) {}

    fn cancel_all_renders(&self) {}
}

/// Runs `generator`, turning a panic into a [CodeError::Scheduler].
fn generate_guarded<T>(generator: &dyn CodeGenerator<T>, content: &str) -> Result<T, CodeError> {
    panic::catch_unwind(AssertUnwindSafe(|| generator.generate(content)))
        .unwrap_or_else(|_| Err(CodeError::Scheduler("generator panicked".to_string())))
}
