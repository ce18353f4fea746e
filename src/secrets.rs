//! Secret resolution for settings values.
//!
//! Passwords and OAuth tokens may be stored encrypted (`ENC[PKCS7,...]`).
//! The settings loader hands every secret to a [`SecretResolver`]; the core
//! never sees ciphertext.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{Result, SnowgateError};

/// Turns a stored secret into plaintext.
pub trait SecretResolver {
    /// Resolve a stored value. Plaintext values come back unchanged.
    fn resolve(&self, ciphertext: &str) -> Result<String>;
}

/// Whether a value looks like an encrypted block.
pub fn is_encrypted(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with("ENC[") && trimmed.ends_with(']')
}

/// Strip the trailing newline folded YAML/TOML blocks leave behind, and
/// the line-wrapping whitespace inside encrypted blocks.
pub fn normalize_secret(raw: &str) -> String {
    let chomped = raw.strip_suffix('\n').unwrap_or(raw);
    let chomped = chomped.strip_suffix('\r').unwrap_or(chomped);
    if is_encrypted(chomped) {
        chomped.split_whitespace().collect()
    } else {
        chomped.to_string()
    }
}

/// Resolver that returns values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl SecretResolver for PassthroughResolver {
    fn resolve(&self, ciphertext: &str) -> Result<String> {
        if is_encrypted(ciphertext) {
            tracing::warn!("encrypted secret found but no secret resolver is configured");
        }
        Ok(ciphertext.to_string())
    }
}

/// Resolver that shells out to an `eyaml`-compatible decrypt command.
///
/// Runs `<program> decrypt -s <ciphertext>` and uses trimmed stdout as the
/// plaintext. Plaintext values are returned without running the command.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: PathBuf,
}

impl CommandResolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SecretResolver for CommandResolver {
    fn resolve(&self, ciphertext: &str) -> Result<String> {
        if !is_encrypted(ciphertext) {
            return Ok(ciphertext.to_string());
        }

        let output = Command::new(&self.program)
            .args(["decrypt", "-s", ciphertext])
            .output()
            .map_err(|e| {
                SnowgateError::secret(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(SnowgateError::secret(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim_end_matches(['\n', '\r']).to_string())
            .map_err(|e| SnowgateError::secret(format!("decrypted value is not UTF-8: {}", e)))
    }
}
