//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Validate a request body, mapping failures to `AppError::Validation`.
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(validation_error)
}

/// Convert validation errors to AppError. Fields are reported in name order.
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    if field_errors.is_empty() {
        return AppError::Validation("Validation failed".into());
    }

    let message = field_errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");

    AppError::Validation(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "must not be empty"))]
        name: String,
        #[validate(range(min = 1, max = 10))]
        count: i64,
    }

    #[test]
    fn test_valid_value_passes() {
        let sample = Sample {
            name: "ok".into(),
            count: 5,
        };
        assert!(validate(&sample).is_ok());
    }

    #[test]
    fn test_all_failing_fields_are_reported() {
        let sample = Sample {
            name: String::new(),
            count: 50,
        };
        match validate(&sample) {
            Err(AppError::Validation(msg)) => {
                assert_eq!(msg, "count: range; name: must not be empty");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
