//! End-to-end: TCP NDJSON → Receiver → RuleTable → DestinationSink → file.

use std::path::Path;
use std::time::Duration;

use aggo_config::AggoConfig;
use aggo_runtime::lifecycle::Reactor;
use aggo_runtime::tracing_init::DomainFormat;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(DomainFormat::new())
                .with_test_writer()
                .with_filter(EnvFilter::try_new("debug").unwrap()),
        )
        .try_init();
}

fn write_rules(dir: &Path, body: &str) {
    std::fs::create_dir_all(dir.join("rules")).unwrap();
    std::fs::write(dir.join("rules/main.toml"), body).unwrap();
}

fn config(persist: bool) -> AggoConfig {
    let mut toml = String::from(
        r#"
[server]
listen = "tcp://127.0.0.1:0"

[runtime]
rules = "rules/*.toml"
default_destination = "file://out/default.jsonl"
"#,
    );
    if persist {
        toml.push_str("\n[persist]\nsnapshot = \"state/snapshot.json\"\n");
    }
    toml.parse().expect("config parse failed")
}

async fn send_lines(reactor: &Reactor, lines: &[&str]) {
    let mut stream = TcpStream::connect(reactor.listen_addr())
        .await
        .expect("connect failed");
    for line in lines {
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }
    stream.shutdown().await.unwrap();
}

fn read_windows(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| serde_json::from_str(l).expect("bad JSON line"))
        .collect()
}

async fn wait_for_windows(path: &Path, n: usize) -> Vec<serde_json::Value> {
    for _ in 0..100 {
        let windows = read_windows(path);
        if windows.len() >= n {
            return windows;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    read_windows(path)
}

#[tokio::test]
async fn window_flushes_to_file_after_wait() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_rules(
        dir.path(),
        r#"
[[rule]]
id = "logins"
event_types = ["login.fail"]
wait_window_ms = 150
destination = "file://out/logins.jsonl"

[[rule]]
id = "api_down"
event_types = ["site247.prod.api"]
wait_window = "150ms"
"#,
    );

    let reactor = Reactor::start(config(false), dir.path()).await.unwrap();
    send_lines(
        &reactor,
        &[
            r#"{"event_type":"login.fail","payload":{"user":"a"}}"#,
            "this is not json",
            r#"{"event_type":"login.fail","payload":{"user":"b"}}"#,
            r#"{"event_type":"unrelated"}"#,
            r#"{"site247":{"MONITORNAME":"api","MONITOR_GROUPNAME":"prod","STATUS":"DOWN"}}"#,
            r#"{"event_type":"login.fail","payload":{"user":"c"}}"#,
        ],
    )
    .await;

    let logins = wait_for_windows(&dir.path().join("out/logins.jsonl"), 1).await;
    let default = wait_for_windows(&dir.path().join("out/default.jsonl"), 1).await;

    reactor.shutdown();
    reactor.wait().await.unwrap();

    assert_eq!(logins.len(), 1, "{logins:?}");
    assert_eq!(logins[0]["rule"]["id"], "logins");
    assert_eq!(logins[0]["event_count"], 3);
    let users: Vec<&str> = logins[0]["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["payload"]["user"].as_str().unwrap())
        .collect();
    assert_eq!(users, ["a", "b", "c"]);

    assert_eq!(default.len(), 1, "{default:?}");
    assert_eq!(default[0]["rule"]["id"], "api_down");
    assert_eq!(default[0]["events"][0]["source"], "site247");
    assert_eq!(default[0]["events"][0]["payload"]["STATUS"], "DOWN");
}

#[tokio::test]
async fn shutdown_drains_open_windows() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_rules(
        dir.path(),
        r#"
[[rule]]
id = "slow"
event_types = ["disk.full"]
wait_window = "1h"
"#,
    );

    let reactor = Reactor::start(config(false), dir.path()).await.unwrap();
    send_lines(&reactor, &[r#"{"event_type":"disk.full"}"#, r#"{"event_type":"disk.full"}"#]).await;

    for _ in 0..100 {
        if reactor.table().is_window_open("slow") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    reactor.shutdown();
    reactor.wait().await.unwrap();

    let windows = read_windows(&dir.path().join("out/default.jsonl"));
    assert_eq!(windows.len(), 1, "{windows:?}");
    assert_eq!(windows[0]["event_count"], 2);
}

#[tokio::test]
async fn snapshot_carries_open_windows_across_restart() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out/default.jsonl");
    let snapshot = dir.path().join("state/snapshot.json");
    write_rules(
        dir.path(),
        r#"
[[rule]]
id = "slow"
event_types = ["disk.full"]
wait_window = "1h"
"#,
    );

    // First run: the window never closes, shutdown persists it.
    let reactor = Reactor::start(config(true), dir.path()).await.unwrap();
    send_lines(
        &reactor,
        &[
            r#"{"event_type":"disk.full","payload":{"host":"a"}}"#,
            r#"{"event_type":"disk.full","payload":{"host":"b"}}"#,
        ],
    )
    .await;
    for _ in 0..100 {
        if reactor.table().snapshot()["slow"].events.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    reactor.shutdown();
    reactor.wait().await.unwrap();

    assert!(snapshot.exists());
    assert!(!out.exists(), "persisted windows must not be posted");

    // Second run with a shorter window: the restored events flush on the new
    // timer.
    write_rules(
        dir.path(),
        r#"
[[rule]]
id = "slow"
event_types = ["disk.full"]
wait_window_ms = 100
"#,
    );
    let reactor = Reactor::start(config(true), dir.path()).await.unwrap();
    assert!(reactor.table().is_window_open("slow"));

    let windows = wait_for_windows(&out, 1).await;
    reactor.shutdown();
    reactor.wait().await.unwrap();

    assert_eq!(windows.len(), 1, "{windows:?}");
    assert_eq!(windows[0]["event_count"], 2);
    assert_eq!(windows[0]["events"][0]["payload"]["host"], "a");
    assert_eq!(windows[0]["events"][1]["payload"]["host"], "b");
}

#[tokio::test]
async fn rule_without_any_destination_fails_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    write_rules(
        dir.path(),
        r#"
[[rule]]
id = "r1"
event_types = ["a"]
wait_window = "1s"
"#,
    );
    let config: AggoConfig = r#"
[server]
listen = "tcp://127.0.0.1:0"

[runtime]
rules = "rules/*.toml"
"#
    .parse()
    .unwrap();
    assert!(Reactor::start(config, dir.path()).await.is_err());
}
