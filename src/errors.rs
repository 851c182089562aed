use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid params: {message}")]
    BadRequest {
        code: &'static str,
        message: String,
    },
    #[error("Unknown {kind}: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("Access denied: {message}")]
    AccessDenied { message: &'static str },
    #[error("{message}")]
    Internal { code: &'static str, message: String },
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn access_denied(message: &'static str) -> Self {
        Self::AccessDenied { message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn not_found_names_kind_and_identifier() {
        assert_eq!(
            AppError::not_found("tool", "bogus").to_string(),
            "Unknown tool: bogus"
        );
        assert_eq!(
            AppError::not_found("prompt", "nope").to_string(),
            "Unknown prompt: nope"
        );
    }

    #[test]
    fn access_denied_is_prefixed() {
        let err = AppError::access_denied("File outside project directory");
        assert_eq!(
            err.to_string(),
            "Access denied: File outside project directory"
        );
    }
}
