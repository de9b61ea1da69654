use image::{Rgba, RgbaImage};
use levelup_core::config::LoaderConfig;
use levelup_core::{MainThread, Update, UpdateManager};
use levelup_services::code::{
    key_for, CodeCache, CodeError, CodeImage, CodeLoader, CompletionSink, HashMapCache, LoadKey,
    Region, RenderRequest, RenderScheduler,
};
use levelup_widgets::{CodeView, OnCodeLoadListener};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

#[derive(Clone, Default)]
struct RecordingScheduler {
    started: Rc<RefCell<Vec<LoadKey>>>,
    cancelled: Rc<RefCell<Vec<LoadKey>>>,
}

impl RenderScheduler<CodeImage> for RecordingScheduler {
    fn start_render(&self, request: RenderRequest, _sink: CompletionSink<CodeImage>) {
        self.started.borrow_mut().push(request.key);
    }

    fn cancel_render(&self, key: &LoadKey) {
        self.cancelled.borrow_mut().push(key.clone());
    }

    fn cancel_all_renders(&self) {}
}

#[derive(Default)]
struct Listener {
    started: Cell<usize>,
    finished: RefCell<Vec<bool>>,
}

impl OnCodeLoadListener for Listener {
    fn on_code_load_started(&self) {
        self.started.set(self.started.get() + 1);
    }

    fn on_code_load_finished(&self, failed: bool) {
        self.finished.borrow_mut().push(failed);
    }
}

struct Fixture {
    _main: MainThread,
    cache: Arc<HashMapCache<CodeImage>>,
    scheduler: RecordingScheduler,
    loader: CodeLoader<CodeImage>,
    updates: UpdateManager,
    listener: Rc<Listener>,
    view: CodeView,
}

fn fixture(config: LoaderConfig) -> Fixture {
    let main = MainThread::new();
    let cache = HashMapCache::shared();
    let scheduler = RecordingScheduler::default();
    let loader = CodeLoader::new(&main, cache.clone(), Box::new(scheduler.clone()));
    let updates = UpdateManager::new();
    let listener = Rc::new(Listener::default());
    let view = CodeView::new(updates.clone(), &config)
        .with_target_color(GREEN)
        .with_listener(listener.clone());

    Fixture {
        _main: main,
        cache,
        scheduler,
        loader,
        updates,
        listener,
        view,
    }
}

fn instant_fade() -> LoaderConfig {
    LoaderConfig {
        fade_delay_ms: 0,
        fade_duration_ms: 0,
        ..LoaderConfig::default()
    }
}

fn test_image() -> CodeImage {
    let mut pixels = RgbaImage::from_pixel(4, 4, WHITE);
    pixels.put_pixel(0, 0, BLACK);
    pixels.put_pixel(3, 3, BLACK);
    CodeImage::new(pixels, vec![Region::new(0, 0, 2, 2)])
}

#[test]
fn setting_the_same_code_twice_is_a_no_op() {
    let f = fixture(LoaderConfig::default());

    f.view.set_code("foo", &f.loader);
    f.updates.take();
    f.view.set_code("foo", &f.loader);

    assert_eq!(f.scheduler.started.borrow().len(), 1);
    assert_eq!(f.listener.started.get(), 1);
    assert!(f.scheduler.cancelled.borrow().is_empty());
    assert!(f.updates.get().is_empty());
    assert_eq!(f.view.code().as_deref(), Some("foo"));
}

#[test]
fn cache_miss_shows_the_image_after_dispatch() {
    let f = fixture(LoaderConfig::default());

    f.view.set_code("foo", &f.loader);
    assert!(f.view.is_loading());
    assert_eq!(f.listener.started.get(), 1);
    assert_eq!(f.updates.take(), Update::DRAW);

    assert!(f.loader.dispatch(&key_for("foo"), test_image()));

    assert!(f.view.is_loaded());
    assert_eq!(f.view.image(), Some(test_image()));
    assert_eq!(*f.listener.finished.borrow(), vec![false]);
    assert!(f.updates.get().contains(Update::DRAW));
    assert_eq!(f.view.size().map(|s| (s.x, s.y)), Some((4, 4)));
}

#[test]
fn cache_hit_shows_the_image_without_a_loading_phase() {
    let f = fixture(LoaderConfig::default());
    f.cache.put(key_for("foo"), test_image());

    f.view.set_code("foo", &f.loader);

    assert!(f.view.is_loaded());
    assert_eq!(f.listener.started.get(), 0);
    assert_eq!(*f.listener.finished.borrow(), vec![false]);
    assert!(f.scheduler.started.borrow().is_empty());
    assert!(f.updates.get().contains(Update::DRAW));
}

#[test]
fn new_code_cancels_the_previous_request() {
    let f = fixture(LoaderConfig::default());

    f.view.set_code("foo", &f.loader);
    f.view.set_code("bar", &f.loader);

    assert_eq!(*f.scheduler.cancelled.borrow(), vec![key_for("foo")]);
    assert!(!f.loader.dispatch(&key_for("foo"), test_image()));
    assert!(!f.view.is_loaded());

    assert!(f.loader.dispatch(&key_for("bar"), test_image()));
    assert!(f.view.is_loaded());
    assert_eq!(f.view.code().as_deref(), Some("bar"));
    assert_eq!(f.listener.started.get(), 2);
}

#[test]
fn failures_are_reported_as_finished_with_error() {
    let f = fixture(LoaderConfig::default());

    f.view.set_code("foo", &f.loader);
    assert!(f
        .loader
        .dispatch_failure(&key_for("foo"), CodeError::GenerationFailed("data too long".into())));

    assert!(f.view.is_failed());
    assert!(!f.view.is_loaded());
    assert!(!f.view.is_loading());
    assert_eq!(*f.listener.finished.borrow(), vec![true]);
    assert!(f.view.compose().is_none());
}

#[test]
fn dropping_the_view_cancels_its_request() {
    let f = fixture(LoaderConfig::default());
    f.view.set_code("foo", &f.loader);

    let Fixture {
        loader,
        scheduler,
        view,
        ..
    } = f;
    drop(view);

    assert_eq!(*scheduler.cancelled.borrow(), vec![key_for("foo")]);
    assert!(!loader.is_pending(&key_for("foo")));
}

#[test]
fn compose_tints_target_regions_once_faded() {
    let f = fixture(instant_fade());
    f.view.set_code("foo", &f.loader);
    f.loader.dispatch(&key_for("foo"), test_image());

    let frame = f.view.compose_at(Instant::now() + Duration::from_millis(1)).unwrap();

    assert_eq!(*frame.get_pixel(0, 0), GREEN);
    assert_eq!(*frame.get_pixel(1, 1), WHITE);
    assert_eq!(*frame.get_pixel(3, 3), BLACK);
}

#[test]
fn fade_waits_for_its_delay() {
    let config = LoaderConfig {
        fade_delay_ms: 60_000,
        fade_duration_ms: 1_000,
        ..LoaderConfig::default()
    };
    let f = fixture(config);
    f.view.set_code("foo", &f.loader);
    f.loader.dispatch(&key_for("foo"), test_image());

    let now = Instant::now();
    assert_eq!(f.view.fade_progress(now), 0.0);
    assert_eq!(*f.view.compose_at(now).unwrap().get_pixel(0, 0), BLACK);

    let halfway = now + Duration::from_millis(60_500);
    let progress = f.view.fade_progress(halfway);
    assert!(progress > 0.0 && progress < 1.0);
    assert_eq!(f.view.fade_progress(now + Duration::from_secs(120)), 1.0);
}

#[test]
fn fade_is_scheduled_only_once() {
    let f = fixture(LoaderConfig {
        fade_delay_ms: 1_000,
        fade_duration_ms: 1_000,
        ..LoaderConfig::default()
    });

    f.view.set_code("foo", &f.loader);
    let first_progress_point = Instant::now() + Duration::from_millis(1_500);
    let before = f.view.fade_progress(first_progress_point);

    std::thread::sleep(Duration::from_millis(20));
    f.view.set_code("bar", &f.loader);

    assert_eq!(f.view.fade_progress(first_progress_point), before);
}

#[test]
fn fade_timer_requests_repaints() {
    let f = fixture(instant_fade());
    f.view.set_code("foo", &f.loader);
    f.updates.take();

    let updates = f.updates.clone();
    assert!(f
        .loader
        .main_thread()
        .run_until(|| updates.get().contains(Update::DRAW), Duration::from_secs(5)));
}

#[test]
fn layout_is_requested_only_when_the_size_changes() {
    let f = fixture(LoaderConfig::default());

    f.view.set_code("foo", &f.loader);
    f.updates.take();
    f.loader.dispatch(&key_for("foo"), test_image());
    assert_eq!(f.updates.take(), Update::DRAW | Update::LAYOUT);

    f.view.set_code("bar", &f.loader);
    f.updates.take();
    f.loader.dispatch(&key_for("bar"), test_image());
    assert_eq!(f.updates.take(), Update::DRAW);

    f.view.set_code("baz", &f.loader);
    f.updates.take();
    let wider = CodeImage::new(RgbaImage::from_pixel(8, 8, WHITE), Vec::new());
    f.loader.dispatch(&key_for("baz"), wider);
    assert_eq!(f.updates.take(), Update::DRAW | Update::LAYOUT);
}
