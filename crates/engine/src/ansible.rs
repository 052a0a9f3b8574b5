//! Ansible playbook executor.
//!
//! Maps an action name to a playbook file under the configured playbook
//! directory and runs `ansible-playbook` against the target device with a
//! one-host inline inventory, piping extra vars as JSON and enforcing a
//! per-invocation timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use homelab_core::template::DEFAULT_EXECUTOR_TYPE;

use crate::executor::{ActionExecutor, ActionOutcome, ActionRequest, ExecutorError};

/// Maximum captured output per invocation (1 MiB). Playbook runs beyond
/// this are truncated to keep job records bounded.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Default per-invocation timeout.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(600);

/// Executes actions by running `ansible-playbook` as a subprocess.
pub struct AnsibleExecutor {
    program: String,
    playbook_dir: PathBuf,
    /// Directory holding one vault password file per secret id.
    vault_password_dir: Option<PathBuf>,
    timeout: Duration,
}

impl AnsibleExecutor {
    pub fn new(playbook_dir: PathBuf, vault_password_dir: Option<PathBuf>) -> Self {
        Self {
            program: "ansible-playbook".to_string(),
            playbook_dir,
            vault_password_dir,
            timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the invoked program. Used by tests to substitute a stub.
    #[doc(hidden)]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn build_command(&self, request: &ActionRequest) -> Result<Command, ExecutorError> {
        validate_action_name(&request.action_name)?;

        let playbook = self.playbook_dir.join(format!("{}.yml", request.action_name));

        let mut cmd = Command::new(&self.program);
        cmd.arg(playbook);
        // One-host inline inventory: a trailing comma makes ansible treat
        // the value as a host list rather than a file path.
        cmd.arg("-i").arg(format!("{},", request.device.address));
        if let Some(user) = &request.device.ssh_user {
            cmd.arg("-u").arg(user);
        }
        if let Some(vars) = &request.extra_vars {
            cmd.arg("-e").arg(vars.to_string());
        }
        if let Some(secret_id) = &request.vault_secret_id {
            validate_action_name(secret_id)?;
            let dir = self.vault_password_dir.as_ref().ok_or_else(|| {
                ExecutorError::InvalidAction(
                    "A vault secret was requested but no vault password directory is configured"
                        .to_string(),
                )
            })?;
            cmd.arg("--vault-password-file").arg(dir.join(secret_id));
        }
        Ok(cmd)
    }
}

/// Reject action and secret names that could escape the configured
/// directories.
fn validate_action_name(name: &str) -> Result<(), ExecutorError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        || name.starts_with('.')
    {
        return Err(ExecutorError::InvalidAction(name.to_string()));
    }
    Ok(())
}

#[async_trait::async_trait]
impl ActionExecutor for AnsibleExecutor {
    async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ExecutorError> {
        if request.executor_type != DEFAULT_EXECUTOR_TYPE {
            return Err(ExecutorError::Unsupported(request.executor_type.clone()));
        }

        let mut cmd = self.build_command(request)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Kill the child if the timeout drops it.
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn()?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_capped(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_capped(stderr_handle).await });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited?,
            Err(_) => {
                return Err(ExecutorError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let mut log_output = String::from_utf8_lossy(&stdout).into_owned();
        if !stderr.is_empty() {
            log_output.push_str(&String::from_utf8_lossy(&stderr));
        }

        Ok(ActionOutcome {
            success: status.success(),
            log_output,
        })
    }
}

/// Read a child stream to completion, capped at [`MAX_OUTPUT_BYTES`].
async fn read_capped<R: tokio::io::AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let Some(mut stream) = stream else {
        return Vec::new();
    };
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if buf.len() < MAX_OUTPUT_BYTES {
                    let take = n.min(MAX_OUTPUT_BYTES - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                // Keep draining past the cap so the child never blocks on a
                // full pipe.
            }
        }
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
