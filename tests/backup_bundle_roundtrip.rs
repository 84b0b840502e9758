use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_raw(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request_raw(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn bundle_round_trips_into_a_fresh_workspace() {
    let src_ws = temp_dir("gradebook-bundle-src");
    let bundle_path = temp_dir("gradebook-bundle-out").join("backup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws1",
        "workspace.select",
        json!({ "path": src_ws.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "scores.upsert",
        json!({
            "student": "Lan", "grade": "10", "className": "10A",
            "subject": "Math", "semester": "HK1",
            "column": "midterm", "value": 8.0
        }),
    );

    let export = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.exportBundle",
        json!({ "outPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(
        export["bundleFormat"].as_str(),
        Some("gradebook-workspace-v1")
    );
    assert_eq!(export["dbSha256"].as_str().map(|s| s.len()), Some(64));

    let dst_ws = temp_dir("gradebook-bundle-dst");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws2",
        "workspace.select",
        json!({ "path": dst_ws.to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.importBundle",
        json!({ "inPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(imported["records"].as_u64(), Some(1));

    let list = request_ok(&mut stdin, &mut reader, "4", "scores.list", json!({}));
    assert_eq!(list["count"].as_u64(), Some(1));
    assert_eq!(list["records"][0]["student"].as_str(), Some("Lan"));
    assert_eq!(list["records"][0]["midterm"].as_f64(), Some(8.0));

    let _ = child.kill();
}

#[test]
fn import_rejects_a_bundle_that_is_not_a_zip() {
    let ws = temp_dir("gradebook-bundle-bad");
    let not_a_bundle = ws.join("garbage.zip");
    std::fs::write(&not_a_bundle, b"this is not a zip archive").expect("write garbage");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": ws.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "scores.upsert",
        json!({
            "student": "Lan", "grade": "10", "className": "10A",
            "subject": "Math", "semester": "HK1",
            "column": "midterm", "value": 8.0
        }),
    );

    let resp = request_raw(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.importBundle",
        json!({ "inPath": not_a_bundle.to_string_lossy() }),
    );
    assert_eq!(resp["ok"].as_bool(), Some(false));
    assert_eq!(resp["error"]["code"].as_str(), Some("import_failed"));

    // The failed import must leave the workspace usable and intact.
    let list = request_ok(&mut stdin, &mut reader, "3", "scores.list", json!({}));
    assert_eq!(list["count"].as_u64(), Some(1));

    let _ = child.kill();
}
