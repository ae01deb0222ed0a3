//! Full stack with real child processes. The "server" is a shell script that
//! announces a port served by the test itself.
#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::*;
use launch_matrix::*;
use serial_test::serial;

fn announcing_strategy(port: u16) -> CommandStrategy {
    CommandStrategy::builder()
        .kind("script")
        .description("script {packaging}")
        .program("sh")
        .args([
            "-c",
            r#"echo "$APP_CONTAINER" > container.txt; echo "$FAKE_PORT" > "$SERVER_PORT_FILE"; exec sleep 60"#,
        ])
        .env([("FAKE_PORT".to_string(), port.to_string())].into())
        .build()
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
#[serial]
fn command_launcher_end_to_end() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let listener = reserve_listener();
    let port = listener.local_addr()?.port();
    let server = serve(listener, 1, 200, "alive");

    let orchestrator = orchestrator(
        LauncherRegistry::new().with(announcing_strategy(port)),
        tmp.path(),
    );
    let spec = TestSpecification::builder()
        .name("e2e")
        .container_kinds(vec![ContainerKind::Undertow])
        .packaging(Packaging::War)
        .launcher_strategies(["script"])
        .build();

    let cell = orchestrator.contexts(&spec)?.remove(0);
    assert_eq!(cell.display_name(), "Undertow: script war");
    assert_eq!(cell.launcher().state(), LauncherState::Unstarted);

    // The first request starts the process and waits for its port.
    let res = cell.client().with_host("127.0.0.1").get("/ping")?;
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), "alive");
    server.join().unwrap();

    let launcher = cell.launcher().clone();
    assert_eq!(launcher.state(), LauncherState::PortKnown(port));
    let pid = launcher.pid().expect("running process");
    assert!(pid_alive(pid)?);

    let working_dir = launcher.working_dir().to_path_buf();
    assert!(wait_until(|| working_dir.join("container.txt").exists()));
    assert_eq!(
        std::fs::read_to_string(working_dir.join("container.txt"))?.trim(),
        "undertow"
    );

    let report = orchestrator.teardown();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.destroyed, 1);
    assert!(!pid_alive(pid)?);
    assert!(!working_dir.exists());
    assert!(matches!(
        cell.client().get("/ping"),
        Err(MatrixError::LauncherDestroyed { .. })
    ));
    Ok(())
}

/// Launchers that were never used are torn down without ever spawning.
#[test]
#[serial]
fn unused_command_launchers_never_spawn() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let orchestrator = orchestrator(
        LauncherRegistry::new().with(announcing_strategy(1)),
        tmp.path(),
    );
    let spec = TestSpecification::builder()
        .name("idle")
        .packaging(Packaging::Jar)
        .launcher_strategies(["script"])
        .build();

    let cells = orchestrator.contexts(&spec)?;
    assert_eq!(cells.len(), 3);
    assert!(cells.iter().all(|c| c.launcher().pid().is_none()));

    let report = orchestrator.teardown();
    assert_eq!(report.destroyed, 3);
    assert!(
        cells
            .iter()
            .all(|c| c.launcher().state() == LauncherState::Destroyed)
    );
    Ok(())
}

/// Threads whose cells share one cache key all reach one spawned process.
#[test]
#[serial]
fn shared_key_spawns_one_process_under_concurrent_requests() -> anyhow::Result<()> {
    const THREADS: usize = 6;
    let tmp = tempfile::tempdir()?;
    let listener = reserve_listener();
    let port = listener.local_addr()?.port();
    let server = serve(listener, THREADS, 200, "shared");

    let strategy = CommandStrategy::builder()
        .kind("script")
        .description("script {packaging}")
        .program("sh")
        .args([
            "-c",
            r#"echo $$ >> spawns.log; echo "$FAKE_PORT" > "$SERVER_PORT_FILE"; exec sleep 60"#,
        ])
        .env([("FAKE_PORT".to_string(), port.to_string())].into())
        .build();
    let orchestrator = orchestrator(LauncherRegistry::new().with(strategy), tmp.path());
    let spec = TestSpecification::builder()
        .name("shared")
        .container_kinds(vec![ContainerKind::Jetty])
        .packaging(Packaging::Jar)
        .launcher_strategies(["script"])
        .build();

    let launchers: Vec<SharedLauncher> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let orchestrator = &orchestrator;
                let spec = &spec;
                s.spawn(move || {
                    let cell = orchestrator.contexts(spec).expect("contexts").remove(0);
                    let res = cell
                        .client()
                        .with_host("127.0.0.1")
                        .get(&format!("/req/{i}"))
                        .expect("request");
                    assert_eq!(res.status, 200);
                    assert_eq!(res.text(), "shared");
                    cell.launcher().clone()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(server.join().unwrap().len(), THREADS);

    let first = &launchers[0];
    assert!(launchers.iter().all(|l| std::sync::Arc::ptr_eq(l, first)));
    let pid = first.pid().expect("running process");
    let spawns = std::fs::read_to_string(first.working_dir().join("spawns.log"))?;
    assert_eq!(spawns.lines().collect::<Vec<_>>(), vec![pid.to_string()]);

    let report = orchestrator.teardown();
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.destroyed, 1);
    assert!(!pid_alive(pid)?);
    Ok(())
}

/// A server that dies before announcing a port fails the request at once
/// instead of burning the retry budget.
#[test]
#[serial]
fn early_exit_fails_fast_with_stderr_log() -> anyhow::Result<()> {
    init_test_logging();
    let tmp = tempfile::tempdir()?;
    let strategy = CommandStrategy::builder()
        .kind("script")
        .description("script {packaging}")
        .program("sh")
        .args(["-c", "echo 'no war file found' >&2; exit 4"])
        .build();
    let config = MatrixConfig::builder()
        .temp_parent(tmp.path().to_path_buf())
        .retry(RetryPolicy::new(50, Duration::from_millis(100)))
        .request_timeout(Duration::from_secs(5))
        .build();
    let orchestrator = MatrixOrchestrator::new(LauncherRegistry::new().with(strategy), config)?;
    let spec = TestSpecification::builder()
        .name("crash")
        .container_kinds(vec![ContainerKind::Tomcat])
        .packaging(Packaging::War)
        .launcher_strategies(["script"])
        .build();
    let cell = orchestrator.contexts(&spec)?.remove(0);

    let started = Instant::now();
    match cell.client().with_host("127.0.0.1").get("/") {
        Err(MatrixError::ServerExited {
            status, stderr_log, ..
        }) => {
            assert!(status.contains('4'), "{status}");
            let log = std::fs::read_to_string(&stderr_log)?;
            assert!(log.contains("no war file found"), "{log}");
        }
        other => panic!("expected the exited server to be reported, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(3));

    let report = orchestrator.teardown();
    assert_eq!(report.destroyed, 1);
    Ok(())
}
