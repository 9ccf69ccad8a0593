//! ui::prompts
//!
//! Interactive confirmation.
//!
//! # Design
//!
//! The engine asks through the [`Confirm`] capability so it never touches
//! the terminal itself. [`TerminalConfirm`] reads an answer from stdin;
//! [`StaticConfirm`] answers without asking (used for `--yes` and in tests).
//! Any failure to read an answer counts as "no".

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no answer: input closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Yes/no confirmation.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Ask `prompt`; `true` means proceed.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmation read from the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

impl TerminalConfirm {
    async fn ask(prompt: &str) -> Result<bool, PromptError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{} [y/N] ", prompt).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        if read == 0 {
            return Err(PromptError::Closed);
        }
        Ok(is_yes(&line))
    }
}

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        match Self::ask(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(error = %e, "treating unreadable answer as no");
                false
            }
        }
    }
}

/// Parse a typed answer.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Fixed answer, recording every prompt it was asked.
#[derive(Debug, Clone)]
pub struct StaticConfirm {
    answer: bool,
    asked: Arc<Mutex<Vec<String>>>,
}

impl StaticConfirm {
    pub fn yes() -> Self {
        Self::answering(true)
    }

    pub fn no() -> Self {
        Self::answering(false)
    }

    fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Arc::default(),
        }
    }

    /// Prompts received so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Confirm for StaticConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        self.asked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        for yes in ["y", "Y", "yes", " YES\n"] {
            assert!(is_yes(yes), "{yes:?}");
        }
        for no in ["", "n", "no", "yep", "\n"] {
            assert!(!is_yes(no), "{no:?}");
        }
    }

    #[tokio::test]
    async fn static_confirm_records_prompts() {
        let confirm = StaticConfirm::no();
        assert!(!confirm.confirm("Is this ok?").await);
        assert_eq!(confirm.asked(), vec!["Is this ok?".to_string()]);
    }
}
