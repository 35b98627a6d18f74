#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/dwcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn docwire() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_docwire"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_listener(sock: &Path, extra: &[&str]) -> Child {
    let child = docwire()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(sock)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen command should start");
    wait_for_socket(sock, Duration::from_secs(3));
    child
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket never appeared: {}", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_with_deadline(mut child: Child, timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        if child.try_wait().expect("child status").is_some() {
            return child.wait_with_output().expect("child output");
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit in time");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn send_reaches_listen() {
    let dir = unique_temp_dir("send");
    let sock = dir.join("listen.sock");
    let listener = spawn_listener(&sock, &["--count", "1"]);

    let sent = docwire()
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock)
        .arg("greeting")
        .arg("--text")
        .arg("hello")
        .output()
        .expect("send should run");
    assert!(sent.status.success(), "{}", String::from_utf8_lossy(&sent.stderr));
    let summary: serde_json::Value =
        serde_json::from_slice(&sent.stdout).expect("send output should be json");
    assert_eq!(summary["key"], "greeting");
    assert_eq!(summary["wire"], "binary");

    let out = wait_with_deadline(listener, Duration::from_secs(5));
    assert!(out.status.success());
    let line = String::from_utf8(out.stdout).expect("utf8 output");
    let doc: serde_json::Value =
        serde_json::from_str(line.lines().next().expect("one document")).expect("json document");
    assert_eq!(doc["index"], 0);
    assert_eq!(doc["meta_data"], false);
    assert_eq!(doc["events"][0]["key"], "greeting");
    assert_eq!(doc["events"][0]["value"], "hello");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn json_payload_over_json_wire() {
    let dir = unique_temp_dir("json");
    let sock = dir.join("listen.sock");
    let listener = spawn_listener(&sock, &["--count", "1"]);

    let sent = docwire()
        .arg("send")
        .arg(&sock)
        .arg("#7")
        .arg("--json")
        .arg(r#"{"qty":3,"tags":["a","b"]}"#)
        .arg("--wire")
        .arg("json")
        .output()
        .expect("send should run");
    assert!(sent.status.success(), "{}", String::from_utf8_lossy(&sent.stderr));

    let out = wait_with_deadline(listener, Duration::from_secs(5));
    let line = String::from_utf8(out.stdout).expect("utf8 output");
    let doc: serde_json::Value = serde_json::from_str(line.trim()).expect("json document");
    assert_eq!(doc["events"][0]["key"], "#7");
    assert_eq!(doc["events"][0]["value"]["qty"], 3);
    assert_eq!(doc["events"][0]["value"]["tags"][1], "b");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn ping_follows_redirect() {
    let dir = unique_temp_dir("redirect");
    let front = dir.join("front.sock");
    let back = dir.join("back.sock");
    let mut backend = spawn_listener(&back, &[]);
    let mut frontend = spawn_listener(&front, &["--redirect", back.to_str().expect("utf8 path")]);

    let out = docwire()
        .arg("--format")
        .arg("json")
        .arg("ping")
        .arg(&front)
        .output()
        .expect("ping should run");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let info: serde_json::Value = serde_json::from_slice(&out.stdout).expect("ping json");
    assert_eq!(info["redirected"], true);
    assert_eq!(info["endpoint"], format!("unix:{}", back.display()));
    assert_eq!(info["header"], "ok");
    assert!(info["test_message"].is_i64());

    let _ = frontend.kill();
    let _ = frontend.wait();
    let _ = backend.kill();
    let _ = backend.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rejected_handshake_has_its_own_exit_code() {
    let dir = unique_temp_dir("reject");
    let sock = dir.join("closed.sock");
    let mut listener = spawn_listener(&sock, &["--reject", "maintenance"]);

    let out = docwire()
        .arg("send")
        .arg(&sock)
        .arg("greeting")
        .output()
        .expect("send should run");
    assert_eq!(out.status.code(), Some(20));
    assert!(String::from_utf8_lossy(&out.stderr).contains("maintenance"));

    let _ = listener.kill();
    let _ = listener.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_socket_is_a_transport_error() {
    let dir = unique_temp_dir("missing");
    let out = docwire()
        .arg("ping")
        .arg(dir.join("absent.sock"))
        .output()
        .expect("ping should run");
    assert_eq!(out.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let out = docwire().arg("version").output().expect("version should run");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert_eq!(text.trim(), format!("docwire {}", env!("CARGO_PKG_VERSION")));
}
