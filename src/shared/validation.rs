//! Validation Utilities

use validator::ValidationErrors;

use super::error::BotError;

/// Convert validation errors to BotError
pub fn validation_error(errors: ValidationErrors) -> BotError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        BotError::Validation("Validation failed".into())
    } else {
        BotError::Validation(messages.join(", "))
    }
}
