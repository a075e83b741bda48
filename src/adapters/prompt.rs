use crate::domain::ports::Prompter;
use crate::utils::error::{MgnError, Result};

/// Used with `--no-prompts`: any attempt to ask the operator is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompter;

impl Prompter for NoPrompter {
    fn input(&self, prompt: &str) -> Result<String> {
        Err(MgnError::config(format!(
            "'{}' is required but prompts are disabled",
            prompt
        )))
    }

    fn password(&self, prompt: &str) -> Result<String> {
        self.input(prompt)
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

#[cfg(feature = "cli")]
impl Prompter for TerminalPrompter {
    fn input(&self, prompt: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| MgnError::config(format!("unable to read {}: {}", prompt, e)))
    }

    fn password(&self, prompt: &str) -> Result<String> {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(|e| MgnError::config(format!("unable to read {}: {}", prompt, e)))
    }
}
