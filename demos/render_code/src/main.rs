use levelup::core::config::TasksConfig;
use levelup::core::tasks;
use levelup::prelude::*;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

struct LogListener;

impl OnCodeLoadListener for LogListener {
    fn on_code_load_started(&self) {
        log::info!("Rendering code...");
    }

    fn on_code_load_finished(&self, failed: bool) {
        if failed {
            log::error!("Code could not be rendered");
        } else {
            log::info!("Code ready");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let settings = tasks::block_on(Settings::new())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level().unwrap_or("info")),
    )
    .init();

    let mut args = std::env::args().skip(1);
    let content = args.next().unwrap_or_else(|| "LU02000TESTTESTTEST030000LU".to_string());
    let output = PathBuf::from(args.next().unwrap_or_else(|| "code.png".to_string()));

    tasks::init(TasksConfig::default())?;

    let config = settings.loader_config();
    let main = MainThread::new();
    let cache: Arc<HashMapCache<CodeImage>> = HashMapCache::shared();
    let generator = Arc::new(QrCodeGenerator::from_config(&config));
    let renderer = BackgroundRenderer::<CodeImage>::from_config(generator, cache.clone(), &config);
    let loader = CodeLoader::new(&main, cache, Box::new(renderer));

    let updates = UpdateManager::new();
    let view = CodeView::new(updates.clone(), &config).with_listener(Rc::new(LogListener));
    view.set_code(&content, &loader);

    let wait = config.render_timeout().unwrap_or(Duration::from_secs(30));
    let settled = || !view.is_loading();
    if !main.run_until(settled, wait) {
        anyhow::bail!("timed out waiting for {}", key_for(&content));
    }

    // Let the fade finish so the saved frame shows the tinted targets.
    main.run_until(|| false, config.fade_delay() + config.fade_duration());

    let frame = view
        .compose()
        .ok_or_else(|| anyhow::anyhow!("no code image for {:?}", content))?;
    frame.save(&output)?;
    log::info!("Wrote {}x{} code to {}", frame.width(), frame.height(), output.display());

    tasks::shutdown();
    Ok(())
}
