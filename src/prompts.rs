//! Prompt registry backed by a YAML file
//!
//! The file is a flat mapping of prompt key to template. Templates use
//! `{name}` placeholders; `{{` and `}}` produce literal braces.
//!
//! ```yaml
//! research_system_prompt: |
//!   You are a research assistant for the {domain} domain.
//!   Context: {context}
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};

use crate::error::{ResearchError, Result};
use crate::types::{PromptConfig, ReloadPolicy};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

/// Key to template mapping with configurable reload behaviour
pub struct PromptRegistry {
    path: PathBuf,
    policy: ReloadPolicy,
    /// `None` until the first load
    prompts: RwLock<Option<HashMap<String, String>>>,
}

impl PromptRegistry {
    pub fn new(path: impl Into<PathBuf>, policy: ReloadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            prompts: RwLock::new(None),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        let path = shellexpand::tilde(&config.path).to_string();
        Self::new(path, config.reload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ReloadPolicy {
        self.policy
    }

    /// Re-read the backing file.
    ///
    /// A missing or malformed file is logged and leaves the registry empty.
    pub fn reload(&self) {
        let prompts = match load_prompt_file(&self.path) {
            Ok(prompts) => prompts,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to load prompts");
                HashMap::new()
            }
        };
        *self.prompts.write() = Some(prompts);
    }

    /// Render the template stored under `key`.
    ///
    /// Returns an empty string when the key is absent.
    pub fn get(&self, key: &str, params: &[(&str, &str)]) -> String {
        let needs_load = match self.policy {
            ReloadPolicy::Always => true,
            ReloadPolicy::Cached => self.prompts.read().is_none(),
        };
        if needs_load {
            self.reload();
        }

        let prompts = self.prompts.read();
        match prompts.as_ref().and_then(|p| p.get(key)) {
            Some(template) => render_template(template, params),
            None => String::new(),
        }
    }

    /// Keys currently loaded, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .prompts
            .read()
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn load_prompt_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let parsed: Option<HashMap<String, String>> =
        serde_yaml::from_str(&content).map_err(|e| ResearchError::Prompt(e.to_string()))?;
    Ok(parsed.unwrap_or_default())
}

/// Substitute `{name}` placeholders. Unknown names are left as written.
pub fn render_template(template: &str, params: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match caps.get(1) {
            Some(name) => params
                .iter()
                .find(|(k, _)| *k == name.as_str())
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string()),
            None => caps[0][..1].to_string(),
        })
        .into_owned()
}
