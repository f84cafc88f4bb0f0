//! Tests for the kitd binary: argument handling, exit status and logging.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use tempfile::{NamedTempFile, TempDir};

fn kitd(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kitd"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute kitd")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_lists_flags() {
    let output = kitd(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in ["--foreground", "--interval", "--cooloff", "--max-interval", "--log-file"] {
        assert!(stdout.contains(flag), "Help should mention {flag}");
    }
}

#[test]
fn test_missing_command_is_rejected() {
    let output = kitd(&["-d"]);
    assert!(!output.status.success());
}

#[test]
fn test_bad_interval_suffix_fails_before_spawning() {
    let output = kitd(&["-d", "-t", "5x", "--", "sh", "-c", "echo spawned"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("Invalid interval suffix"), "{stderr}");
    assert!(!stderr.contains("spawned"), "{stderr}");
}

#[test]
fn test_bad_config_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "cooloff = \"soon\"").unwrap();

    let output = kitd(&["-d", "-f", file.path().to_str().unwrap(), "--", "true"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("soon"));
}

#[test]
fn test_not_executable_exit_status_stops_supervisor() {
    let output = kitd(&["-d", "--", "sh", "-c", "exit 127"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("child exited 127"));
}

#[test]
fn test_terminate_stops_cleanly_and_logs_output() {
    let output = kitd(&["-d", "--", "sh", "-c", "echo hello; kill -TERM $PPID; sleep 30"]);

    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert!(stderr(&output).contains("hello"));
}

#[test]
fn test_log_file_receives_records() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("kitd.log");

    let output = kitd(&[
        "-d",
        "-n",
        "probe",
        "-l",
        log.to_str().unwrap(),
        "--",
        "sh",
        "-c",
        "echo to-the-file; exit 127",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("to-the-file"), "{contents}");
    assert!(contents.contains("child exited 127"), "{contents}");
    assert!(contents.contains("probe"), "{contents}");
}

#[test]
fn test_terminate_stops_child_that_floods_output() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_kitd"))
        .args(["-d", "--", "yes"])
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to execute kitd");

    thread::sleep(Duration::from_secs(1));
    let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
    kill(pid, Signal::SIGTERM).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("kitd still running 10s after SIGTERM");
        }
        thread::sleep(Duration::from_millis(50));
    };

    assert_eq!(status.code(), Some(0));
}
