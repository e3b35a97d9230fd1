use crate::error::{LifecycleError, LifecycleResult};
use indicatif::{ProgressBar as IndicatifProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout and stderr joined, for notes and failure reports
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }

    /// Last `max_lines` lines of combined output
    pub fn tail(&self, max_lines: usize) -> String {
        let combined = self.combined();
        let lines: Vec<&str> = combined.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Runs external commands, streaming output while capturing it
///
/// Children are killed when the returned future is dropped, so an outer
/// `tokio::time::timeout` actually stops the process.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner {
    show_progress: bool,
}

impl ProcessRunner {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    /// Run `program args..` in `cwd`, piping `stdin` if given
    ///
    /// A non-zero exit is reported through `CommandOutput::success`, not as an error.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
        stdin: Option<&str>,
    ) -> LifecycleResult<CommandOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .envs(env)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let progress = if self.show_progress {
            let pb = IndicatifProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
            }
            pb.set_message(format!("Running {}...", program));
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut child = cmd.spawn().map_err(|e| LifecycleError::io(cwd, e))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(|e| LifecycleError::io(cwd, e))?;
            pipe.flush().await.map_err(|e| LifecycleError::io(cwd, e))?;
            drop(pipe);
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            LifecycleError::io(cwd, std::io::Error::other("failed to capture stdout"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            LifecycleError::io(cwd, std::io::Error::other("failed to capture stderr"))
        })?;

        let mut stdout_reader = BufReader::new(stdout).lines();
        let mut stderr_reader = BufReader::new(stderr).lines();

        let mut output = CommandOutput::default();
        let mut stdout_done = false;
        let mut stderr_done = false;

        // Drain both pipes together to avoid backpressure deadlock
        while !stdout_done || !stderr_done {
            tokio::select! {
                line = stdout_reader.next_line(), if !stdout_done => {
                    match line.map_err(|e| LifecycleError::io(cwd, e))? {
                        Some(line) => {
                            if let Some(ref pb) = progress {
                                let short_line: String = line.chars().take(60).collect();
                                pb.set_message(short_line);
                            }
                            tracing::debug!(target: "evolvd::process", program, "{}", line);
                            output.stdout.push_str(&line);
                            output.stdout.push('\n');
                        }
                        None => stdout_done = true,
                    }
                }
                line = stderr_reader.next_line(), if !stderr_done => {
                    match line.map_err(|e| LifecycleError::io(cwd, e))? {
                        Some(line) => {
                            tracing::debug!(target: "evolvd::process", program, stderr = true, "{}", line);
                            output.stderr.push_str(&line);
                            output.stderr.push('\n');
                        }
                        None => stderr_done = true,
                    }
                }
            }
        }

        let status = child.wait().await.map_err(|e| LifecycleError::io(cwd, e))?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        output.success = status.success();
        output.exit_code = status.code();
        Ok(output)
    }
}
