pub mod command;
pub mod scripted;
pub mod tags;

use crate::config::ProviderConfig;
use crate::event::StreamEvent;
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub use command::CommandProvider;
pub use scripted::ScriptedProvider;

/// Stream of events from a provider
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Source of thinking/answer fragments for one prompt at a time
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating for a prompt and return the event stream
    async fn complete(&self, prompt: &str) -> Result<EventStream>;

    /// Stop the generation started by the last `complete` call (best effort)
    async fn cancel(&self) -> Result<()> {
        Ok(())
    }

    /// Get the provider name
    fn name(&self) -> &str;
}

/// Pick a provider from CLI flags, falling back to the config file.
///
/// Precedence: `--script`, then `--command`, then `provider.command` from the
/// config, then the built-in demo transcript.
pub fn from_args(
    script: Option<&Path>,
    command: Option<&str>,
    cfg: &ProviderConfig,
) -> Result<Arc<dyn Provider>> {
    let delay = Duration::from_millis(cfg.script_chunk_delay_ms);

    if let Some(path) = script {
        return Ok(Arc::new(ScriptedProvider::from_file(path, delay)?));
    }
    if let Some(line) = command {
        return Ok(Arc::new(CommandProvider::from_command_line(
            line,
            Vec::new(),
            &cfg.system_prompt,
        )?));
    }
    if let Some(line) = cfg.command.as_deref().filter(|c| !c.trim().is_empty()) {
        return Ok(Arc::new(CommandProvider::from_command_line(
            line,
            cfg.args.clone(),
            &cfg.system_prompt,
        )?));
    }
    Ok(Arc::new(ScriptedProvider::demo(delay)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_precedence() {
        let mut cfg = ProviderConfig::default();
        assert_eq!(from_args(None, None, &cfg).unwrap().name(), "demo");

        cfg.command = Some("llama-cli -m model.gguf".to_string());
        assert_eq!(from_args(None, None, &cfg).unwrap().name(), "llama-cli");
        assert_eq!(
            from_args(None, Some("other --flag"), &cfg).unwrap().name(),
            "other"
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "<answer>hi</answer>").unwrap();
        assert_eq!(
            from_args(Some(&path), Some("other"), &cfg).unwrap().name(),
            "script"
        );
    }

    #[test]
    fn test_blank_config_command_falls_back_to_demo() {
        let cfg = ProviderConfig {
            command: Some("   ".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(from_args(None, None, &cfg).unwrap().name(), "demo");
    }
}
