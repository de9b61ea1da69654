#![cfg(feature = "tokio-runner")]

use levelup_core::config::TasksConfig;
use levelup_core::tasks;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn default_runner_runs_detached_and_blocking_work() {
    tasks::init(TasksConfig::default()).unwrap();

    let (tx, rx) = mpsc::channel();
    tasks::spawn(async move {
        let _ = tx.send("detached");
    });
    assert_eq!(rx.recv_timeout(Duration::from_secs(3)), Ok("detached"));

    let (tx, rx) = mpsc::channel();
    tasks::spawn(async move {
        let name = tasks::spawn_blocking(|| std::thread::current().name().map(str::to_string)).await;
        let _ = tx.send(name);
    });
    let name = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(name.as_deref(), Some("levelup-render"));

    assert_eq!(tasks::block_on(tasks::spawn_blocking(|| 6 * 7)), 42);

    tasks::shutdown();
}
