use std::{process::ExitStatus, time::Duration};

use tokio::process::Command;

use crate::error::AdapterError;

pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_lossy(&self) -> String {
        lossy_utf8(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> String {
        lossy_utf8(&self.stderr)
    }
}

/// Replaces invalid UTF-8 byte sequences with the replacement character, per
/// the spec's requirement that adapter output always reach the client as
/// valid text before redaction runs.
fn lossy_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Spawns `command`, retrying briefly on transient "text file busy" errors
/// seen when another process is mid-write to the target binary.
pub(crate) fn spawn_with_retry(
    command: &mut Command,
    binary: &str,
) -> Result<tokio::process::Child, AdapterError> {
    let mut last_err = None;
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                last_err = Some(source);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                break;
            }
        }
    }
    Err(AdapterError::Spawn {
        command: binary.to_string(),
        source: last_err.expect("loop always records an error before breaking"),
    })
}

/// Runs `binary` with `args`, waiting up to `timeout` for completion.
/// Cancellation on timeout kills the child process so no orphan subprocess
/// survives the call.
pub async fn run_with_timeout(
    binary: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, AdapterError> {
    run_with_timeout_env(binary, args, &[], timeout).await
}

/// As [`run_with_timeout`], additionally setting `env` on the child process
/// (used to pass `DOCKER_HOST`, `KUBECONFIG`, etc. to pass-through CLIs).
pub async fn run_with_timeout_env(
    binary: &str,
    args: &[String],
    env: &[(String, String)],
    timeout: Duration,
) -> Result<CommandOutput, AdapterError> {
    let mut command = Command::new(binary);
    command
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    let mut child = spawn_with_retry(&mut command, binary)?;

    let wait = async {
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| AdapterError::Permanent(format!("waiting for {binary}: {source}")))?;
        Ok::<_, AdapterError>(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_a_real_command() {
        let output = run_with_timeout(
            "echo",
            &["hello".to_string()],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(output.exit_code(), 0);
        assert_eq!(output.stdout_lossy().trim_end(), "hello");
    }

    #[tokio::test]
    async fn times_out_long_running_commands() {
        let result = run_with_timeout(
            "sleep",
            &["2".to_string()],
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(AdapterError::Timeout(_))));
    }
}
