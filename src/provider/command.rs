//! Local model backend: a subprocess fed a ChatML prompt on stdin
//!
//! Works with any command that reads a prompt from stdin and streams the raw
//! completion to stdout (llama.cpp's CLI, a wrapper script, ...). The output
//! is split into channels by [`TagParser`].

use super::tags::TagParser;
use super::{EventStream, Provider};
use crate::event::StreamEvent;
use crate::logging;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

/// Wrap one message in ChatML markers.
fn format_message(role: &str, content: &str) -> String {
    format!("<|im_start|>{}\n{}\n<|im_end|>", role, content)
}

/// Build the full prompt: system and user turns, then an open assistant turn.
pub fn format_chatml(system: &str, prompt: &str) -> String {
    let mut turns = Vec::new();
    if !system.trim().is_empty() {
        turns.push(format_message("system", system));
    }
    turns.push(format_message("user", prompt));
    format!("{}\n<|im_start|>assistant\n", turns.join("\n"))
}

pub struct CommandProvider {
    program: String,
    label: String,
    args: Vec<String>,
    system_prompt: String,
    /// Fires (or drops) to stop the running child
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>, system_prompt: &str) -> Self {
        let program = program.into();
        let label = Path::new(&program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("command")
            .to_string();
        Self {
            program,
            label,
            args,
            system_prompt: system_prompt.to_string(),
            stop: Mutex::new(None),
        }
    }

    /// Parse `"program arg1 arg2"`; `extra_args` are appended.
    pub fn from_command_line(
        line: &str,
        extra_args: Vec<String>,
        system_prompt: &str,
    ) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("Provider command is empty"))?;
        let mut args: Vec<String> = parts.collect();
        args.extend(extra_args);
        Ok(Self::new(program, args, system_prompt))
    }
}

#[async_trait]
impl Provider for CommandProvider {
    async fn complete(&self, prompt: &str) -> Result<EventStream> {
        let input = format_chatml(&self.system_prompt, prompt);
        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(100);
        let (stop_tx, stop_rx) = oneshot::channel();
        if let Ok(mut guard) = self.stop.lock() {
            // Dropping the previous sender stops any run still in flight.
            *guard = Some(stop_tx);
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        let label = self.label.clone();

        tokio::spawn(async move {
            if let Err(e) = run_streaming_command(cmd, input, tx.clone(), stop_rx, &label).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn cancel(&self) -> Result<()> {
        let sender = self
            .stop
            .lock()
            .map_err(|_| anyhow::anyhow!("Command provider state poisoned"))?
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

async fn run_streaming_command(
    mut cmd: Command,
    input: String,
    tx: mpsc::Sender<Result<StreamEvent>>,
    mut stop: oneshot::Receiver<()>,
    label: &str,
) -> Result<()> {
    cmd.kill_on_drop(true)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", label))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture {} stdin", label))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture {} stdout", label))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture {} stderr", label))?;

    tokio::spawn(async move {
        let _ = stdin.write_all(input.as_bytes()).await;
        let _ = stdin.shutdown().await;
    });

    let label_for_log = label.to_string();
    let stderr_task = tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = reader.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            logging::debug(&format!("[{}] {}", label_for_log, line));
            if !collected.is_empty() {
                collected.push('\n');
            }
            collected.push_str(&line);
        }
        collected
    });

    let mut parser = TagParser::new();
    let mut undecoded: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            _ = &mut stop => {
                let _ = child.kill().await;
                logging::info(&format!("Killed {} on cancel", label));
                return Ok(());
            }
            read = stdout.read(&mut buf) => {
                let n = read.with_context(|| format!("Failed to read {} output", label))?;
                if n == 0 {
                    break;
                }
                undecoded.extend_from_slice(&buf[..n]);
                let text = take_utf8(&mut undecoded);
                for event in parser.feed(&text) {
                    if tx.send(Ok(event)).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    let tail = String::from_utf8_lossy(&undecoded).into_owned();
    let mut remaining = parser.feed(&tail);
    remaining.extend(parser.finish());
    for event in remaining {
        if tx.send(Ok(event)).await.is_err() {
            return Ok(());
        }
    }

    let status = child.wait().await?;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        if !stderr_text.trim().is_empty() {
            anyhow::bail!("{} exited with status {}: {}", label, status, stderr_text.trim());
        }
        anyhow::bail!("{} exited with status {}", label, status);
    }

    let _ = tx
        .send(Ok(StreamEvent::MessageEnd {
            stop_reason: Some("end_turn".to_string()),
        }))
        .await;
    Ok(())
}

/// Take the longest valid UTF-8 prefix, keeping an incomplete trailing sequence.
fn take_utf8(bytes: &mut Vec<u8>) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let text = text.to_string();
            bytes.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&bytes[..valid]).into_owned();
            bytes.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            bytes.clear();
            text
        }
    }
}
