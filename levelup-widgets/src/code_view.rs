use image::{Rgba, RgbaImage};
use levelup_core::config::LoaderConfig;
use levelup_core::main_thread::MainThread;
use levelup_core::update::{Update, UpdateManager};
use levelup_services::code::{
    key_for, CodeError, CodeImage, CodeLoader, LoadCallback, LoadKey, OnCodeLoaded, PendingImage,
    Region,
};
use nalgebra::Vector2;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Color the target regions fade into by default.
pub const DEFAULT_TARGET_COLOR: Rgba<u8> = Rgba([0xF2, 0x6B, 0x1D, 0xFF]);

/// Pixels darker than this count as code modules when tinting.
const DARK_THRESHOLD: u32 = 128;

/// Told when a [CodeView] starts and stops waiting for an image.
pub trait OnCodeLoadListener {
    /// The view is waiting for a render.
    fn on_code_load_started(&self);

    /// The wait is over. `failed` is `true` when no image is coming.
    fn on_code_load_finished(&self, failed: bool);
}

/// Shows the payment code for one content string at a time.
///
/// Images come from a [CodeLoader] bound to the same main thread. The view
/// only ever waits on the most recent content: setting new content cancels
/// the previous request. The first code shown starts a one-shot color fade
/// of the code's target regions after the configured delay.
pub struct CodeView {
    state: Rc<RefCell<ViewState>>,
    updates: UpdateManager,
    fade_delay: Duration,
    fade_duration: Duration,
    target_color: Rgba<u8>,
}

#[derive(Default)]
struct ViewState {
    code: Option<String>,
    key: Option<LoadKey>,
    pending: Option<PendingImage<CodeImage>>,
    image: Option<CodeImage>,
    failed: bool,
    fade_start: Option<Instant>,
    shown_size: Option<Vector2<u32>>,
    listener: Option<Rc<dyn OnCodeLoadListener>>,
}

impl CodeView {
    /// Create an empty view that requests repaints through `updates`.
    pub fn new(updates: UpdateManager, config: &LoaderConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewState::default())),
            updates,
            fade_delay: config.fade_delay(),
            fade_duration: config.fade_duration(),
            target_color: DEFAULT_TARGET_COLOR,
        }
    }

    /// Set the color the target regions fade into.
    pub fn with_target_color(mut self, color: Rgba<u8>) -> Self {
        self.target_color = color;
        self
    }

    /// Set the loading listener.
    pub fn with_listener(self, listener: Rc<dyn OnCodeLoadListener>) -> Self {
        self.set_listener(Some(listener));
        self
    }

    /// Replace or remove the loading listener.
    pub fn set_listener(&self, listener: Option<Rc<dyn OnCodeLoadListener>>) {
        self.state.borrow_mut().listener = listener;
    }

    /// Show the code for `content`, loading it through `loader`.
    ///
    /// Setting the content that is already shown does nothing.
    ///
    /// # Panics
    ///
    /// When called off the loader's main thread.
    pub fn set_code(&self, content: &str, loader: &CodeLoader<CodeImage>) {
        let main = loader.main_thread();
        main.assert_current("CodeView::set_code");

        if self.state.borrow().fade_start.is_none() {
            self.schedule_fade(main);
        }

        let previous = {
            let mut state = self.state.borrow_mut();
            if state.code.as_deref() == Some(content) {
                return;
            }
            state.code = Some(content.to_string());
            state.key = Some(key_for(content));
            state.image = None;
            state.failed = false;
            state.pending.take()
        };

        if let Some(previous) = previous {
            previous.cancel_load();
        }

        let callback: LoadCallback<CodeImage> = Rc::new(ViewCallback {
            state: Rc::downgrade(&self.state),
            main: main.clone(),
            updates: self.updates.clone(),
        });
        let pending = loader.get_code(content, Some(callback));
        let loaded = pending.is_loaded();

        let listener = {
            let mut state = self.state.borrow_mut();
            state.pending = Some(pending);
            state.listener.clone()
        };

        if !loaded {
            if let Some(listener) = listener {
                listener.on_code_load_started();
            }
        }
        self.updates.insert(Update::DRAW);
    }

    fn schedule_fade(&self, main: &MainThread) {
        let start = Instant::now() + self.fade_delay;
        self.state.borrow_mut().fade_start = Some(start);
        log::debug!("Code color fade starts in {:?}", self.fade_delay);

        let updates = self.updates.clone();
        let delay = self.fade_delay;
        let duration = self.fade_duration;
        main.spawn_local(async move {
            smol::Timer::after(delay).await;
            updates.insert(Update::DRAW);
            smol::Timer::after(duration).await;
            updates.insert(Update::DRAW);
        });
    }

    /// The content currently shown.
    pub fn code(&self) -> Option<String> {
        self.state.borrow().code.clone()
    }

    /// The image for the current content, once loaded.
    pub fn image(&self) -> Option<CodeImage> {
        self.state.borrow().image.clone()
    }

    /// Whether the image for the current content is shown.
    pub fn is_loaded(&self) -> bool {
        self.state.borrow().image.is_some()
    }

    /// Whether loading the current content failed.
    pub fn is_failed(&self) -> bool {
        self.state.borrow().failed
    }

    /// Whether the view is still waiting for an image.
    pub fn is_loading(&self) -> bool {
        let state = self.state.borrow();
        state.code.is_some() && state.image.is_none() && !state.failed
    }

    /// Pixel size of the current image.
    pub fn size(&self) -> Option<Vector2<u32>> {
        self.state
            .borrow()
            .image
            .as_ref()
            .map(|image| Vector2::new(image.width, image.height))
    }

    /// Progress of the color fade at `now`, from `0.0` to `1.0`.
    pub fn fade_progress(&self, now: Instant) -> f32 {
        let Some(start) = self.state.borrow().fade_start else {
            return 0.0;
        };
        if now < start {
            return 0.0;
        }
        if self.fade_duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.duration_since(start);
        (elapsed.as_secs_f32() / self.fade_duration.as_secs_f32()).min(1.0)
    }

    /// The frame to draw now.
    pub fn compose(&self) -> Option<RgbaImage> {
        self.compose_at(Instant::now())
    }

    /// The frame to draw at `now`: the code image with its target regions
    /// tinted by the fade progress. [None] until an image is loaded.
    pub fn compose_at(&self, now: Instant) -> Option<RgbaImage> {
        let progress = self.fade_progress(now);
        let image = self.image()?;
        let mut frame = image.to_rgba_image()?;
        if progress > 0.0 {
            for region in image.targets.iter() {
                tint_region(&mut frame, region, self.target_color, progress);
            }
        }
        Some(frame)
    }
}

impl Drop for CodeView {
    fn drop(&mut self) {
        let pending = self.state.borrow_mut().pending.take();
        if let Some(pending) = pending {
            pending.cancel_load();
        }
    }
}

struct ViewCallback {
    state: Weak<RefCell<ViewState>>,
    main: MainThread,
    updates: UpdateManager,
}

impl ViewCallback {
    fn finish(&self, key: &LoadKey, image: Option<&CodeImage>) {
        self.main.assert_current("CodeView load callback");

        let Some(state) = self.state.upgrade() else {
            return;
        };

        let (listener, update) = {
            let mut state = state.borrow_mut();
            if state.key.as_ref() != Some(key) {
                log::debug!("Ignoring stale code {} for view", key);
                return;
            }
            state.image = image.cloned();
            state.failed = image.is_none();

            let mut update = Update::DRAW;
            let size = image.map(|image| Vector2::new(image.width, image.height));
            if size.is_some() && size != state.shown_size {
                state.shown_size = size;
                update |= Update::LAYOUT;
            }
            (state.listener.clone(), update)
        };

        if let Some(listener) = listener {
            listener.on_code_load_finished(image.is_none());
        }
        self.updates.insert(update);
    }
}

impl OnCodeLoaded<CodeImage> for ViewCallback {
    fn on_code_loaded(&self, key: &LoadKey, image: &CodeImage) {
        self.finish(key, Some(image));
    }

    fn on_code_failed(&self, key: &LoadKey, error: &CodeError) {
        log::warn!("Code view could not load {}: {}", key, error);
        self.finish(key, None);
    }
}

fn tint_region(frame: &mut RgbaImage, region: &Region, color: Rgba<u8>, amount: f32) {
    let right = region.x.saturating_add(region.width).min(frame.width());
    let bottom = region.y.saturating_add(region.height).min(frame.height());

    for y in region.y..bottom {
        for x in region.x..right {
            let pixel = frame.get_pixel_mut(x, y);
            if is_dark(pixel) {
                *pixel = blend(*pixel, color, amount);
            }
        }
    }
}

fn is_dark(pixel: &Rgba<u8>) -> bool {
    let [r, g, b, _] = pixel.0;
    (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000 < DARK_THRESHOLD
}

fn blend(from: Rgba<u8>, to: Rgba<u8>, amount: f32) -> Rgba<u8> {
    let t = amount.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Rgba([
        mix(from[0], to[0]),
        mix(from[1], to[1]),
        mix(from[2], to[2]),
        mix(from[3], to[3]),
    ])
}
