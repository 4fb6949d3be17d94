use serde_json::{json, Value};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

struct HostGuard {
    child: Child,
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_host(home: &Path, store: &Path, extra: &[&str]) -> HostGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_tabtime"))
        .env("HOME", home)
        .env_remove("TABTIME_DEBUG_LOG")
        .arg("--store")
        .arg(store)
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn tabtime");
    HostGuard { child }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_millis() as i64
}

fn send(stdin: &mut ChildStdin, value: Value) {
    let body = value.to_string().into_bytes();
    stdin
        .write_all(&(body.len() as u32).to_ne_bytes())
        .expect("Failed to write length");
    stdin.write_all(&body).expect("Failed to write body");
    stdin.flush().expect("Failed to flush");
}

fn receive(stdout: &mut ChildStdout) -> Value {
    let mut len = [0u8; 4];
    stdout.read_exact(&mut len).expect("Failed to read length");
    let mut body = vec![0u8; u32::from_ne_bytes(len) as usize];
    stdout.read_exact(&mut body).expect("Failed to read body");
    serde_json::from_slice(&body).expect("Failed to parse frame")
}

fn tab_reply(request_id: &Value, url: &str) -> Value {
    json!({
        "protocolVersion": 1,
        "type": "lookup_reply",
        "requestId": request_id,
        "result": {
            "kind": "tab",
            "tab": { "id": 1, "windowId": 7, "url": url, "active": true }
        }
    })
}

#[test]
fn browsing_session_is_recorded_through_stdio() {
    let home = TempDir::new().expect("temp home");
    let store = home.path().join("sessions.json");
    let mut host = spawn_host(home.path(), &store, &[]);
    let mut stdin = host.child.stdin.take().expect("stdin");
    let mut stdout = host.child.stdout.take().expect("stdout");

    let t0 = now_ms() + 1_000;
    send(
        &mut stdin,
        json!({ "protocolVersion": 1, "type": "window_focus_changed", "windowId": 7, "recordedAt": t0 }),
    );
    let lookup = receive(&mut stdout);
    assert_eq!(lookup["type"], "lookup");
    assert_eq!(lookup["query"]["kind"], "active_tab");
    send(&mut stdin, tab_reply(&lookup["requestId"], "https://example.com/a"));

    send(
        &mut stdin,
        json!({ "protocolVersion": 1, "type": "tab_activated", "tabId": 1, "recordedAt": t0 + 5_000 }),
    );
    let lookup = receive(&mut stdout);
    assert_eq!(lookup["query"]["kind"], "tab");
    send(&mut stdin, tab_reply(&lookup["requestId"], "https://other.org/"));

    send(
        &mut stdin,
        json!({ "protocolVersion": 1, "type": "window_focus_changed", "windowId": -1, "recordedAt": t0 + 9_000 }),
    );
    drop(stdin);

    let status = host.child.wait().expect("wait");
    assert!(status.success());

    let document: Value =
        serde_json::from_str(&std::fs::read_to_string(&store).expect("store written"))
            .expect("store json");
    let sessions = document["mainSessions"].as_array().expect("mainSessions");
    // The host's own startup session is ended by focus loss; none remain open.
    assert_eq!(sessions.len(), 1);
    let main = &sessions[0];
    assert_eq!(main["endTimestamp"], json!(t0 + 9_000));
    let tabs = main["tabSessions"].as_array().expect("tabSessions");
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0]["domain"], "example.com");
    assert_eq!(tabs[0]["startTimestamp"], json!(t0));
    assert_eq!(tabs[0]["endTimestamp"], json!(t0 + 5_000));
    assert_eq!(tabs[1]["domain"], "other.org");
    assert_eq!(tabs[1]["endTimestamp"], json!(t0 + 9_000));
}

#[test]
fn invalid_message_gets_error_reply_and_loop_continues() {
    let home = TempDir::new().expect("temp home");
    let store = home.path().join("sessions.json");
    let mut host = spawn_host(
        home.path(),
        &store,
        &["chrome-extension://abcdefghijklmnop/"],
    );
    let mut stdin = host.child.stdin.take().expect("stdin");
    let mut stdout = host.child.stdout.take().expect("stdout");

    send(&mut stdin, json!({ "protocolVersion": 9, "type": "tab_activated", "tabId": 1, "recordedAt": 1 }));
    let error = receive(&mut stdout);
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "unsupported_version");

    send(
        &mut stdin,
        json!({ "protocolVersion": 1, "type": "tab_activated", "tabId": 3, "recordedAt": now_ms() }),
    );
    let lookup = receive(&mut stdout);
    assert_eq!(lookup["type"], "lookup");
    assert_eq!(lookup["query"], json!({ "kind": "tab", "tabId": 3 }));

    drop(stdin);
    assert!(host.child.wait().expect("wait").success());
}
