use std::{io::Write, path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStderr, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

fn quote_file(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

fn qotd() -> assert_cmd::Command {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("qotd"))
}

#[test]
fn missing_quote_file_argument_prints_usage() {
    let output = qotd().env("RUST_LOG", "off").output().expect("run qotd");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr was: {stderr}");
}

#[test]
fn repeated_port_flag_is_rejected() {
    qotd()
        .args(["-p", "1717", "-p", "1718", "quotes.txt"])
        .assert()
        .failure();
}

#[test]
fn zero_port_is_rejected() {
    qotd().args(["-p", "0", "quotes.txt"]).assert().failure();
}

#[test]
fn unreadable_quote_file_fails_startup() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.txt");

    let output = qotd()
        .args(["--host", "127.0.0.1", "-p", &free_port().to_string()])
        .arg(&missing)
        .env("RUST_LOG", "info")
        .output()
        .expect("run qotd");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("quote file not found"), "stderr was: {stderr}");
    assert!(stderr.contains("Usage"), "stderr was: {stderr}");
}

#[test]
fn blank_quote_file_fails_startup() {
    let file = quote_file("\n\n").expect("quote file");
    qotd()
        .args(["--host", "127.0.0.1", "-p", &free_port().to_string()])
        .arg(file.path())
        .assert()
        .failure();
}

#[cfg(unix)]
#[tokio::test]
async fn serves_quote_and_exits_cleanly_on_sigterm() -> Result<()> {
    use tokio::{io::AsyncReadExt, net::TcpStream};

    let file = quote_file("Hello, world.\n")?;
    let binary = assert_cmd::cargo::cargo_bin!("qotd");
    let port = free_port();

    let mut child = spawn_server(binary, port, file.path())?;
    let mut stderr = BufReader::new(child.stderr.take().context("stderr missing after spawn")?);
    wait_for_banner(&mut stderr).await?;

    let log_task = tokio::spawn(async move {
        let mut line = String::new();
        while stderr.read_line(&mut line).await.map(|n| n > 0).unwrap_or(false) {
            line.clear();
        }
    });

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let mut received = String::new();
    timeout(READ_TIMEOUT, stream.read_to_string(&mut received)).await??;
    assert_eq!(received, "Hello, world.");

    send_sigterm(&child)?;
    let status = timeout(READ_TIMEOUT, child.wait())
        .await
        .context("server did not exit after SIGTERM")??;
    assert!(status.success(), "server exited with {status}");

    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());
    let _ = log_task.await;
    Ok(())
}

fn free_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    probe.local_addr().expect("probe addr").port()
}

fn spawn_server(binary: &Path, port: u16, quotes: &Path) -> Result<Child> {
    let mut cmd = Command::new(binary);
    cmd.args(["--host", "127.0.0.1", "--accept-timeout-ms", "100"])
        .arg("-p")
        .arg(port.to_string())
        .arg(quotes)
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.spawn().context("failed to spawn qotd")
}

async fn wait_for_banner(reader: &mut BufReader<ChildStderr>) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = timeout(READ_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| anyhow!("timed out waiting for listening banner"))??;
        if read == 0 {
            return Err(anyhow!("server exited before listening"));
        }
        if line.contains("quote server listening on") {
            return Ok(());
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> Result<()> {
    let pid = child.id().context("server already exited")?;
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .context("failed to run kill")?;
    if !status.success() {
        return Err(anyhow!("kill exited with {status}"));
    }
    Ok(())
}
