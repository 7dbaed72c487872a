// Line-oriented input files (tokens, proxies) and the append-only token store.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Read a newline-delimited list, trimming each line and skipping blanks.
/// A missing or unreadable file is treated as an empty list.
pub fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(data) => data
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            log::error!("Error reading {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn read_tokens(path: &Path) -> Vec<String> {
    let tokens = read_lines(path);
    if tokens.is_empty() {
        log::error!("No tokens found in {}.", path.display());
    } else {
        log::info!("Loaded {} tokens from {}.", tokens.len(), path.display());
    }
    tokens
}

pub fn read_proxies(path: &Path) -> Vec<String> {
    let proxies = read_lines(path);
    if proxies.is_empty() {
        log::warn!("No proxies found in {}. Proceeding without proxy.", path.display());
    } else {
        log::info!("Loaded {} proxies.", proxies.len());
    }
    proxies
}

/// Append-only file of session tokens, one per line.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one token. Surrounding whitespace is stripped so the line
    /// reads back exactly; empty or multi-line tokens are rejected.
    pub fn append(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            anyhow::bail!("token is empty");
        }
        if token.contains('\n') || token.contains('\r') {
            anyhow::bail!("token must be a single line");
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", token).with_context(|| format!("Failed to write {}", self.path.display()))?;
        log::info!("Saved token to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Vec<String> {
        read_tokens(&self.path)
    }
}
