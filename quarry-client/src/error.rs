use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned status {status}: {error_type}{}", reason_suffix(.reason))]
    Status {
        status: u16,
        error_type: String,
        reason: Option<String>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Core(#[from] quarry::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Status { status, .. } => *status == 404,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = ClientError::Status {
            status: 400,
            error_type: "parsing_exception".to_string(),
            reason: Some("unknown query [foo]".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Engine returned status 400: parsing_exception: unknown query [foo]"
        );

        let err = ClientError::Status {
            status: 500,
            error_type: "unknown".to_string(),
            reason: None,
        };
        assert_eq!(err.to_string(), "Engine returned status 500: unknown");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(ClientError::NotFound("posts".into()).is_not_found());
        assert!(ClientError::Status {
            status: 404,
            error_type: "index_not_found_exception".into(),
            reason: None,
        }
        .is_not_found());
        assert!(!ClientError::Config("bad".into()).is_not_found());
    }
}
