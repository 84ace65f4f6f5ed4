#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "chronoquic-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn chronoquic() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_chronoquic"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn gencert(dir: &Path) {
    let status = chronoquic()
        .arg("gencert")
        .arg("--cert")
        .arg(dir.join("server.crt"))
        .arg("--key")
        .arg(dir.join("server.key"))
        .stdout(Stdio::null())
        .status()
        .expect("gencert should run");
    assert!(status.success());
}

struct RunningServer {
    child: Child,
    port: u16,
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn serve(dir: &Path) -> RunningServer {
    let mut child = chronoquic()
        .arg("--format")
        .arg("raw")
        .arg("serve")
        .arg("0")
        .arg("--cert")
        .arg(dir.join("server.crt"))
        .arg("--key")
        .arg(dir.join("server.key"))
        .arg("--delay")
        .arg("0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let stdout = child.stdout.take().expect("stdout should be piped");
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("serve should print its address");
    let port = line
        .trim()
        .rsplit(':')
        .next()
        .and_then(|port| port.parse().ok())
        .unwrap_or_else(|| panic!("unexpected serve output: {line:?}"));
    RunningServer { child, port }
}

fn request(dir: &Path, port: u16, pattern: &str) -> std::process::Output {
    chronoquic()
        .arg("--format")
        .arg("raw")
        .arg("request")
        .arg(pattern)
        .arg("--port")
        .arg(port.to_string())
        .arg("--ca-cert")
        .arg(dir.join("server.crt"))
        .arg("--timeout")
        .arg("3s")
        .output()
        .expect("request should run")
}

#[test]
fn version_prints_name() {
    let output = chronoquic()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("chronoquic "));
}

#[test]
fn gencert_reports_written_files_as_json() {
    let dir = unique_temp_dir("gencert");
    let output = chronoquic()
        .arg("--format")
        .arg("json")
        .arg("gencert")
        .arg("--cert")
        .arg(dir.join("a.crt"))
        .arg("--key")
        .arg(dir.join("a.key"))
        .arg("--san")
        .arg("localhost")
        .arg("--san")
        .arg("127.0.0.1")
        .output()
        .expect("gencert should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"subject_alt_names\":[\"localhost\",\"127.0.0.1\"]"));
    let cert = std::fs::read_to_string(dir.join("a.crt")).expect("cert should exist");
    assert!(cert.contains("BEGIN CERTIFICATE"));
    assert!(dir.join("a.key").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn serve_without_certificate_fails_fast() {
    let dir = unique_temp_dir("nocert");
    let output = chronoquic()
        .arg("serve")
        .arg("0")
        .arg("--cert")
        .arg(dir.join("missing.crt"))
        .arg("--key")
        .arg(dir.join("missing.key"))
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("start failed"));
    assert!(stderr.contains("missing.crt"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn request_against_running_server() {
    let dir = unique_temp_dir("request");
    gencert(&dir);
    let server = serve(&dir);

    let output = request(&dir, server.port, "%Y");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let year = chrono::Local::now().format("%Y").to_string();
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), year);

    let output = request(&dir, server.port, "%Q");
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("request failed"));

    drop(server);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn request_with_invalid_timeout_is_usage_error() {
    let output = chronoquic()
        .arg("request")
        .arg("%Y")
        .arg("--timeout")
        .arg("soon")
        .output()
        .expect("request should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn request_without_server_times_out() {
    let dir = unique_temp_dir("noserver");
    gencert(&dir);
    let port = std::net::UdpSocket::bind("127.0.0.1:0")
        .and_then(|socket| socket.local_addr())
        .expect("probe socket should bind")
        .port();

    let output = chronoquic()
        .arg("request")
        .arg("%Y")
        .arg("--port")
        .arg(port.to_string())
        .arg("--ca-cert")
        .arg(dir.join("server.crt"))
        .arg("--timeout")
        .arg("500ms")
        .output()
        .expect("request should run");
    assert_eq!(output.status.code(), Some(124));
    let _ = std::fs::remove_dir_all(&dir);
}
