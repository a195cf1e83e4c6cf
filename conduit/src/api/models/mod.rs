//! Wire-format request and response types.
//!
//! Requests and responses use the enveloped JSON shape clients expect
//! (`{"user": ...}`, `{"article": ...}`, `{"comment": ...}`). Validation
//! lives on the request field structs; view assembly for a given viewer
//! lives in [`enrichment`].

pub mod articles;
pub mod comments;
pub mod enrichment;
pub mod pagination;
pub mod profiles;
pub mod users;

use crate::errors::Error;
use std::collections::BTreeMap;

/// Accumulates per-field validation messages and turns them into a single
/// validation error.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    /// `Ok(())` when no messages were recorded
    pub fn into_result(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { errors: self.errors })
        }
    }
}

/// Just enough email validation to catch obvious garbage; deliverability is
/// the mail server's problem.
pub(crate) fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name+tag@sub.example.co.uk"));

        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user @example.com"));
    }

    #[test]
    fn field_errors_accumulate() {
        let mut errors = FieldErrors::default();
        errors.push("title", "too short");
        errors.push("title", "contains emoji");
        errors.push("body", "too long");

        let err = errors.into_result().unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert_eq!(errors["title"].len(), 2);
                assert_eq!(errors["body"].len(), 1);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::default().into_result().is_ok());
    }
}
