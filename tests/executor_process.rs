//! Command executor integration tests against real processes

use std::time::{Duration, Instant};

use kube_helper::exec::{ExecError, ExecRequest, execute};

fn sh(script: &str) -> ExecRequest {
    ExecRequest::new(vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn test_timeout_kills_and_reaps() {
    let started = Instant::now();
    let request = sh("echo $$; exec sleep 30").with_timeout(Some(Duration::from_millis(300)));

    let err = execute("sh", request).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        ExecError::Timeout { cmd, timeout } => {
            assert_eq!(timeout, Duration::from_millis(300));
            assert!(cmd[0].ends_with("sh"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timed_out_child_is_gone() {
    // The child writes its pid to a file first so it can be checked afterwards
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());

    let result = execute("sh", sh(&script).with_timeout(Some(Duration::from_millis(300)))).await;
    assert!(matches!(result, Err(ExecError::Timeout { .. })));

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
}

/// Running, as opposed to gone or a zombie waiting for its new parent to reap it
#[cfg(target_os = "linux")]
fn process_running(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next()) != Some("Z"),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_background_processes() {
    // The shell exits at once, but its background sleep keeps stdout open
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("bg.pid");
    let script = format!("sleep 30 & echo $! > {}; echo done", pid_file.display());

    let result = execute("sh", sh(&script).with_timeout(Some(Duration::from_millis(500)))).await;
    assert!(matches!(result, Err(ExecError::Timeout { .. })));

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let deadline = Instant::now() + Duration::from_secs(2);
    while process_running(&pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!process_running(&pid), "background process {pid} survived the timeout");
}

#[tokio::test]
async fn test_check_turns_nonzero_exit_into_error() {
    let request = sh("echo partial; echo boom >&2; exit 3").with_check(true);

    match execute("sh", request).await.unwrap_err() {
        ExecError::NonZeroExit { code, stdout, stderr, .. } => {
            assert_eq!(code, 3);
            assert_eq!(stdout, "partial\n");
            assert_eq!(stderr, "boom\n");
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_nonzero_exit_without_check_is_a_result() {
    let result = execute("sh", sh("echo refused >&2; exit 1")).await.unwrap();
    assert_eq!(result.returncode, 1);
    assert!(!result.success());
    assert_eq!(result.stderr, "refused\n");
}

#[tokio::test]
async fn test_timeout_wins_over_check() {
    let request = sh("sleep 30; exit 1")
        .with_check(true)
        .with_timeout(Some(Duration::from_millis(200)));
    assert!(matches!(execute("sh", request).await, Err(ExecError::Timeout { .. })));
}

#[tokio::test]
async fn test_large_stdin_does_not_deadlock() {
    // Larger than any pipe buffer in both directions
    let input = "x".repeat(4 * 1024 * 1024);
    let request = ExecRequest::new(Vec::<String>::new())
        .with_stdin(Some(input.clone()))
        .with_timeout(Some(Duration::from_secs(20)));

    let result = execute("cat", request).await.unwrap();
    assert_eq!(result.stdout.len(), input.len());
}

#[tokio::test]
async fn test_without_stdin_reads_eof() {
    let result = execute("cat", ExecRequest::new(Vec::<String>::new())).await.unwrap();
    assert_eq!(result.returncode, 0);
    assert!(result.stdout.is_empty());
}

#[tokio::test]
async fn test_capture_disabled_leaves_strings_empty() {
    let request = sh("echo visible; echo also >&2").with_capture_output(false);
    let result = execute("sh", request).await.unwrap();

    assert_eq!(result.returncode, 0);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
    assert!(result.json.is_none());
}

#[tokio::test]
async fn test_json_stdout_is_decoded() {
    let result = execute("sh", sh(r#"echo '{"items": [{"name": "pod-a"}]}'"#)).await.unwrap();
    let json = result.json.expect("stdout should decode");
    assert_eq!(json["items"][0]["name"], "pod-a");
}

#[tokio::test]
async fn test_invalid_utf8_is_decoded_lossily() {
    let result = execute("sh", sh(r"printf 'ok\377'")).await.unwrap();
    assert!(result.stdout.starts_with("ok"));
    assert!(result.stdout.contains('\u{FFFD}'));
}

#[cfg(unix)]
#[tokio::test]
async fn test_signal_exit_is_negative() {
    let result = execute("sh", sh("kill -9 $$")).await.unwrap();
    assert_eq!(result.returncode, -9);
}

#[tokio::test]
async fn test_unbalanced_quotes_fail_before_spawn() {
    let err = execute("echo", ExecRequest::new("'unterminated")).await.unwrap_err();
    assert!(matches!(err, ExecError::InvalidArguments(_)));
}
