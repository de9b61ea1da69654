// SPDX-License-Identifier: LGPL-3.0-only

//! The code loader: cache lookup, in-flight bookkeeping and dispatch.

use crate::code::cache::CodeCache;
use crate::code::error::CodeError;
use crate::code::executor::{Completion, CompletionSink, RenderRequest, RenderScheduler};
use crate::code::key::LoadKey;
use crate::code::pending::{CancelRegistration, ImageSlot, PendingImage};
use levelup_core::main_thread::MainThread;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Notified on the main thread when a requested code is ready.
pub trait OnCodeLoaded<T> {
    /// The image for `key` is available.
    fn on_code_loaded(&self, key: &LoadKey, image: &T);

    /// Rendering the image for `key` failed.
    fn on_code_failed(&self, key: &LoadKey, error: &CodeError) {
        log::warn!("Code load for {} failed: {}", key, error);
    }
}

impl<T, F> OnCodeLoaded<T> for F
where
    F: Fn(&LoadKey, &T),
{
    fn on_code_loaded(&self, key: &LoadKey, image: &T) {
        self(key, image)
    }
}

/// Shared callback handle passed to [CodeLoader::get_code].
pub type LoadCallback<T> = Rc<dyn OnCodeLoaded<T>>;

struct Registration<T> {
    ticket: u64,
    slot: ImageSlot<T>,
    callback: Option<LoadCallback<T>>,
}

struct Inner<T> {
    main: MainThread,
    cache: Arc<dyn CodeCache<T>>,
    scheduler: Box<dyn RenderScheduler<T>>,
    sink: CompletionSink<T>,
    in_flight: RefCell<HashMap<LoadKey, Vec<Registration<T>>>>,
    next_ticket: Cell<u64>,
}

impl<T> Inner<T> {
    fn take_registrations(&self, key: &LoadKey) -> Option<Vec<Registration<T>>> {
        self.in_flight.borrow_mut().remove(key)
    }
}

impl<T> CancelRegistration for Inner<T> {
    fn cancel_registration(&self, key: &LoadKey, ticket: u64) {
        self.main.assert_current("PendingImage::cancel_load");

        let now_idle = {
            let mut in_flight = self.in_flight.borrow_mut();
            let Some(registrations) = in_flight.get_mut(key) else {
                return;
            };
            registrations.retain(|r| r.ticket != ticket);
            if registrations.is_empty() {
                in_flight.remove(key);
                true
            } else {
                false
            }
        };

        if now_idle {
            log::debug!("Last caller for {} cancelled, cancelling render", key);
            self.scheduler.cancel_render(key);
        }
    }
}

/// Coordinates code loads for one main thread.
///
/// A cache hit resolves synchronously. A miss registers the caller and asks
/// the [RenderScheduler] for a render, at most one per key while that key
/// is pending. Results come back through [CodeLoader::dispatch] on the main
/// thread, which resolves every waiting [PendingImage] and fires every
/// registered callback exactly once.
///
/// The loader is neither `Send` nor `Sync`; cloning is cheap and clones
/// share the same bookkeeping.
pub struct CodeLoader<T> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + 'static> CodeLoader<T> {
    /// Create a loader bound to `main`.
    ///
    /// Render results sent through the scheduler's sink are applied by a
    /// task running on `main`, so they only take effect while `main` is
    /// being driven.
    pub fn new(
        main: &MainThread,
        cache: Arc<dyn CodeCache<T>>,
        scheduler: Box<dyn RenderScheduler<T>>,
    ) -> Self {
        main.assert_current("CodeLoader::new");

        let (tx, rx) = smol::channel::unbounded::<Completion<T>>();
        let inner = Rc::new(Inner {
            main: main.clone(),
            cache,
            scheduler,
            sink: CompletionSink::new(tx),
            in_flight: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(1),
        });

        let weak = Rc::downgrade(&inner);
        main.spawn_local(async move {
            while let Ok(Completion { key, result }) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let loader = CodeLoader { inner };
                match result {
                    Ok(image) => loader.dispatch(&key, image),
                    Err(error) => loader.dispatch_failure(&key, error),
                };
            }
        });

        Self { inner }
    }

    /// Request the code image for `content`.
    ///
    /// On a cache hit the returned image is already loaded and `callback`
    /// has already been called. Otherwise the callback is registered and
    /// fires from [CodeLoader::dispatch]; a render is started unless one is
    /// already pending for the same content.
    pub fn get_code(&self, content: &str, callback: Option<LoadCallback<T>>) -> PendingImage<T> {
        let inner = &self.inner;
        inner.main.assert_current("CodeLoader::get_code");

        let key = LoadKey::for_content(content);

        if let Some(image) = inner.cache.get(&key) {
            log::debug!("Code cache hit: {}", key);
            let pending = PendingImage::resolved(key.clone(), image.clone());
            if let Some(callback) = callback {
                callback.on_code_loaded(&key, &image);
            }
            return pending;
        }

        let ticket = inner.next_ticket.get();
        inner.next_ticket.set(ticket + 1);
        let slot = ImageSlot::new();

        let start = {
            let mut in_flight = inner.in_flight.borrow_mut();
            let registrations = in_flight.entry(key.clone()).or_default();
            let start = registrations.is_empty();
            registrations.push(Registration {
                ticket,
                slot: slot.clone(),
                callback,
            });
            start
        };

        if start {
            log::debug!("Code cache miss: {}, starting render", key);
            inner.scheduler.start_render(
                RenderRequest {
                    content: content.to_string(),
                    key: key.clone(),
                },
                inner.sink.clone(),
            );
        } else {
            log::debug!("Code {} already loading, joining request", key);
        }

        let canceller: Rc<dyn CancelRegistration> = inner.clone();
        PendingImage::registered(key, slot, ticket, Rc::downgrade(&canceller))
    }

    /// Deliver a rendered image for `key`.
    ///
    /// Resolves every pending image for the key, then calls and unregisters
    /// every callback. Returns whether any callback was called, so late or
    /// duplicate deliveries report `false`. Does not write the cache.
    ///
    /// # Panics
    ///
    /// When called off the loader's main thread.
    pub fn dispatch(&self, key: &LoadKey, image: T) -> bool {
        self.inner.main.assert_current("CodeLoader::dispatch");

        let Some(registrations) = self.inner.take_registrations(key) else {
            log::debug!("Ignoring dispatch for {}: nothing registered", key);
            return false;
        };

        for registration in &registrations {
            registration.slot.set_image(image.clone());
        }

        let mut invoked = false;
        for callback in registrations.into_iter().filter_map(|r| r.callback) {
            callback.on_code_loaded(key, &image);
            invoked = true;
        }
        invoked
    }

    /// Deliver a render failure for `key`.
    ///
    /// Same bookkeeping as [CodeLoader::dispatch], with the error recorded on
    /// each pending image and passed to [OnCodeLoaded::on_code_failed].
    pub fn dispatch_failure(&self, key: &LoadKey, error: CodeError) -> bool {
        self.inner.main.assert_current("CodeLoader::dispatch_failure");

        let Some(registrations) = self.inner.take_registrations(key) else {
            log::debug!("Ignoring failure for {}: nothing registered", key);
            return false;
        };

        for registration in &registrations {
            registration.slot.set_error(error.clone());
        }

        let mut invoked = false;
        for callback in registrations.into_iter().filter_map(|r| r.callback) {
            callback.on_code_failed(key, &error);
            invoked = true;
        }
        invoked
    }

    /// Drop every caller waiting on `key` and ask the scheduler to stop.
    ///
    /// A later dispatch for the key is ignored.
    pub fn cancel_load(&self, key: &LoadKey) {
        self.inner.main.assert_current("CodeLoader::cancel_load");

        if self.inner.take_registrations(key).is_some() {
            log::debug!("Cancelled load for {}", key);
            self.inner.scheduler.cancel_render(key);
        }
    }

    /// Drop every waiting caller and ask the scheduler to stop everything.
    pub fn cancel_all_loads(&self) {
        self.inner.main.assert_current("CodeLoader::cancel_all_loads");

        let dropped = {
            let mut in_flight = self.inner.in_flight.borrow_mut();
            let count = in_flight.len();
            in_flight.clear();
            count
        };
        log::debug!("Cancelled {} pending code loads", dropped);
        self.inner.scheduler.cancel_all_renders();
    }

    /// Whether a load for `key` is waiting on a render.
    pub fn is_pending(&self, key: &LoadKey) -> bool {
        self.inner.in_flight.borrow().contains_key(key)
    }

    /// Number of keys waiting on a render.
    pub fn pending_count(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    /// The main thread this loader is bound to.
    pub fn main_thread(&self) -> &MainThread {
        &self.inner.main
    }
}

impl<T> Clone for CodeLoader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}
