use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DEEPSEEK_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Connection settings for the three provider backends.
///
/// Every field is optional; `resolve` applies the environment fallback and
/// defaults. An empty or missing key means "unconfigured" — adapters refuse
/// to issue requests for it rather than failing at construction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// DeepSeek API key (falls back to `DEEPSEEK_API_KEY`)
    pub deepseek_api_key: Option<String>,

    /// DeepSeek chat-completions endpoint
    pub deepseek_api_url: Option<String>,

    /// Claude API key
    pub claude_api_key: Option<String>,

    /// Ollama server base URL
    pub ollama_url: Option<String>,
}

/// Settings with fallbacks applied, as the service consumes them.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub deepseek_api_key: String,
    pub deepseek_api_url: String,
    pub claude_api_key: String,
    pub ollama_url: String,
}

impl Settings {
    /// Load settings if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Settings = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }

    /// Load from `config.toml` under the platform config directory.
    pub fn load_default() -> anyhow::Result<Option<Self>> {
        let dir = crate::paths::config_dir()?;
        Self::load_optional(dir.join("config.toml"))
    }

    /// Apply the `DEEPSEEK_API_KEY` environment fallback and URL defaults.
    pub fn resolve(&self) -> ResolvedSettings {
        let deepseek_api_key = self
            .deepseek_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .unwrap_or_default();

        ResolvedSettings {
            deepseek_api_key,
            deepseek_api_url: self
                .deepseek_api_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_DEEPSEEK_URL.to_string()),
            claude_api_key: self.claude_api_key.clone().unwrap_or_default(),
            ollama_url: self
                .ollama_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_applies_defaults_when_empty() {
        let r = Settings::default().resolve();
        assert_eq!(r.deepseek_api_url, DEFAULT_DEEPSEEK_URL);
        assert_eq!(r.ollama_url, DEFAULT_OLLAMA_URL);
        assert!(r.claude_api_key.is_empty());
    }

    #[test]
    fn resolve_keeps_explicit_values() {
        let s = Settings {
            deepseek_api_key: Some("sk-test".into()),
            deepseek_api_url: Some("https://proxy.example/v1/chat/completions".into()),
            claude_api_key: Some("ck".into()),
            ollama_url: Some("http://10.0.0.5:11434".into()),
        };
        let r = s.resolve();
        assert_eq!(r.deepseek_api_key, "sk-test");
        assert_eq!(r.deepseek_api_url, "https://proxy.example/v1/chat/completions");
        assert_eq!(r.claude_api_key, "ck");
        assert_eq!(r.ollama_url, "http://10.0.0.5:11434");
    }

    #[test]
    fn empty_strings_fall_back_like_missing_values() {
        let s = Settings {
            deepseek_api_url: Some(String::new()),
            ollama_url: Some(String::new()),
            ..Settings::default()
        };
        let r = s.resolve();
        assert_eq!(r.deepseek_api_url, DEFAULT_DEEPSEEK_URL);
        assert_eq!(r.ollama_url, DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn load_default_reads_the_config_dir() {
        let dir = std::env::temp_dir().join(format!("flowchat-test-{}", std::process::id()));
        std::env::set_var("FLOWCHAT_HOME", &dir);

        assert!(Settings::load_default().unwrap().is_none());

        std::fs::create_dir_all(dir.join("config")).unwrap();
        std::fs::write(dir.join("config/config.toml"), "deepseek_api_key = \"sk\"\n").unwrap();
        let cfg = Settings::load_default().unwrap().unwrap();
        assert_eq!(cfg.deepseek_api_key.as_deref(), Some("sk"));

        std::env::remove_var("FLOWCHAT_HOME");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn toml_round_trip() {
        let text = r#"
deepseek_api_key = "sk-abc"
ollama_url = "http://localhost:11434"
"#;
        let cfg: Settings = toml::from_str(text).unwrap();
        assert_eq!(cfg.deepseek_api_key.as_deref(), Some("sk-abc"));
        assert!(cfg.claude_api_key.is_none());
    }
}
