//! NATS subject validation.
//!
//! Publish subjects must be concrete (`orders.created`); stream subjects may
//! carry `*` (one token) and `>` (tail) wildcards.

use crate::error::SubjectError;

fn check_tokens(subject: &str) -> Result<(), SubjectError> {
    if subject.is_empty() {
        return Err(SubjectError::Empty);
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(SubjectError::Whitespace(subject.to_string()));
    }
    if subject.split('.').any(str::is_empty) {
        return Err(SubjectError::EmptyToken(subject.to_string()));
    }
    Ok(())
}

/// Validate a subject a message can be published to.
pub fn validate_publish_subject(subject: &str) -> Result<(), SubjectError> {
    check_tokens(subject)?;
    if subject.contains('*') || subject.contains('>') {
        return Err(SubjectError::Wildcard(subject.to_string()));
    }
    Ok(())
}

/// Validate a subject pattern a stream can capture.
pub fn validate_subject_pattern(pattern: &str) -> Result<(), SubjectError> {
    check_tokens(pattern)?;
    let tokens: Vec<&str> = pattern.split('.').collect();
    let last = tokens.len() - 1;
    for (i, token) in tokens.iter().enumerate() {
        let has_wildcard = token.contains('*') || token.contains('>');
        let valid = match *token {
            "*" => true,
            ">" => i == last,
            _ => !has_wildcard,
        };
        if !valid {
            return Err(SubjectError::MisplacedWildcard(pattern.to_string()));
        }
    }
    Ok(())
}

/// Check whether `subject` is captured by a stream `pattern`.
///
/// `*` matches exactly one token, `>` matches one or more trailing tokens.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
