use crate::error::{CompanionError, Result};

const MAX_INPUT_CHARS: usize = 4000;

/// Guards user input before it reaches the remote services.
pub struct InputValidator {
    max_chars: usize,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            max_chars: MAX_INPUT_CHARS,
        }
    }

    /// Returns the trimmed prompt, rejecting empty or oversized input.
    pub fn validate_prompt<'a>(&self, text: &'a str) -> Result<&'a str> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CompanionError::InvalidInput(
                "Prompt cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > self.max_chars {
            return Err(CompanionError::InvalidInput(format!(
                "Prompt exceeds {} characters",
                self.max_chars
            )));
        }
        Ok(trimmed)
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prompt_rejected() {
        let validator = InputValidator::new();
        assert!(validator.validate_prompt("   ").is_err());
    }

    #[test]
    fn test_prompt_is_trimmed() {
        let validator = InputValidator::new();
        let out = validator.validate_prompt("  hello  ").expect("valid");
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_oversized_prompt_rejected() {
        let validator = InputValidator::new();
        let long = "x".repeat(MAX_INPUT_CHARS + 1);
        assert!(validator.validate_prompt(&long).is_err());
    }
}
