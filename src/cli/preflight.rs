//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials are available before starting operations
//! that would otherwise fail on the first model call.

use crate::config::Settings;
use crate::error::{Result, SporError};
use crate::openai::DEFAULT_API_KEY_ENV;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering needs the completion key; semantic questions also embed the question.
    Ask { semantic: bool },
    /// Adding a video needs the embedding key when indexing.
    Index,
    /// Listing and removing only touch local storage.
    Catalog,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    for var in required_keys(operation, settings) {
        check_api_key(var)?;
    }
    Ok(())
}

/// API key variables an operation needs, without duplicates.
fn required_keys(operation: Operation, settings: &Settings) -> Vec<&str> {
    let completion_key = settings.completion.api_key_env.as_str();
    match operation {
        Operation::Ask { semantic } if semantic && completion_key != DEFAULT_API_KEY_ENV => {
            vec![completion_key, DEFAULT_API_KEY_ENV]
        }
        Operation::Ask { .. } => vec![completion_key],
        Operation::Index => vec![DEFAULT_API_KEY_ENV],
        Operation::Catalog => Vec::new(),
    }
}

/// Check that an API key environment variable is set and non-empty.
fn check_api_key(var: &str) -> Result<()> {
    match std::env::var(var) {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(SporError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            var, var
        ))),
        Err(_) => Err(SporError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_no_requirements() {
        assert!(check(Operation::Catalog, &Settings::default()).is_ok());
    }

    #[test]
    fn test_near_questions_only_need_the_completion_key() {
        let mut settings = Settings::default();
        settings.completion.api_key_env = "GROQ_API_KEY".to_string();

        assert_eq!(
            required_keys(Operation::Ask { semantic: false }, &settings),
            vec!["GROQ_API_KEY"]
        );
        assert_eq!(
            required_keys(Operation::Ask { semantic: true }, &settings),
            vec!["GROQ_API_KEY", DEFAULT_API_KEY_ENV]
        );
    }

    #[test]
    fn test_shared_key_is_checked_once() {
        let settings = Settings::default();
        assert_eq!(settings.completion.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(
            required_keys(Operation::Ask { semantic: true }, &settings),
            vec![DEFAULT_API_KEY_ENV]
        );
        assert!(required_keys(Operation::Catalog, &settings).is_empty());
    }

    #[test]
    fn test_missing_key_names_the_variable() {
        let err = check_api_key("SPOR_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(err.to_string().contains("SPOR_TEST_KEY_THAT_IS_NEVER_SET not set"));
    }
}
