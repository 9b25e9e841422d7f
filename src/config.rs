use crate::inference::DEFAULT_CACHE_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Used when the prompt file is missing.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer questions about the provided images and text concisely.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub host: String,
    pub port: u16,

    // Session storage
    pub prompt_path: PathBuf,
    pub history_dir: PathBuf,

    // Generation
    pub cache_threshold: usize,
    pub max_new_tokens: usize,
    pub stub_token_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 5000)?,

            prompt_path: env::var("PROMPT_PATH")
                .unwrap_or_else(|_| "prompt.txt".to_string())
                .into(),
            history_dir: env::var("HISTORY_DIR")
                .unwrap_or_else(|_| "./history".to_string())
                .into(),

            cache_threshold: parse_var("CACHE_THRESHOLD", DEFAULT_CACHE_THRESHOLD)?,
            max_new_tokens: parse_var("MAX_NEW_TOKENS", 600)?,
            stub_token_delay_ms: parse_var("STUB_TOKEN_DELAY_MS", 40)?,
        })
    }

    /// Reads the system prompt, falling back to the built-in one.
    pub fn load_system_prompt(&self) -> String {
        match std::fs::read_to_string(&self.prompt_path) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(
                    "[CONFIG] could not read {} ({}), using built-in system prompt",
                    self.prompt_path.display(),
                    e
                );
                DEFAULT_SYSTEM_PROMPT.to_string()
            }
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {:?} ({})", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prompt_falls_back() {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 5000,
            prompt_path: "/nonexistent/prompt.txt".into(),
            history_dir: "./history".into(),
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            max_new_tokens: 600,
            stub_token_delay_ms: 0,
        };
        assert_eq!(config.load_system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_prompt_file_is_read() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Describe images.")?;

        let config = Config {
            host: "127.0.0.1".into(),
            port: 5000,
            prompt_path: path,
            history_dir: dir.path().join("history"),
            cache_threshold: 10,
            max_new_tokens: 5,
            stub_token_delay_ms: 0,
        };
        assert_eq!(config.load_system_prompt(), "Describe images.");
        Ok(())
    }
}
