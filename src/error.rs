use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("Decision port produced no usable output after {retries} retries")]
    EmptyDecision { retries: usize },

    #[error("Unknown handler: {name}")]
    UnknownHandler { name: String },

    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    #[error("Action execution error: action={action}, {message}")]
    ActionExecution { action: String, message: String },

    #[error("Decision port error: {0}")]
    Port(String),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("No checkpoint found for thread {thread_id}")]
    ThreadNotFound { thread_id: String },

    #[error("Thread {thread_id} has no pending approval to resume")]
    NoPendingApproval { thread_id: String },

    #[error("Thread {thread_id} is awaiting approval; resolve it before sending a new message")]
    ApprovalPending { thread_id: String },

    #[error("Turn exceeded the step limit of {steps}")]
    StepLimitExceeded { steps: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type ConciergeResult<T> = Result<T, ConciergeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = ConciergeError::EmptyDecision { retries: 3 };
        assert!(err.to_string().contains("3 retries"));

        let err = ConciergeError::UnknownHandler {
            name: "book_spa".into(),
        };
        assert_eq!(err.to_string(), "Unknown handler: book_spa");

        let err = ConciergeError::ActionExecution {
            action: "cancel_ticket".into(),
            message: "missing ticket_no".into(),
        };
        assert!(err.to_string().contains("cancel_ticket"));

        let err = ConciergeError::NoPendingApproval {
            thread_id: "t-42".into(),
        };
        assert!(err.to_string().contains("t-42"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConciergeError>();
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ConciergeError = io_err.into();
        assert!(matches!(err, ConciergeError::Io(_)));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: ConciergeError = json_err.into();
        assert!(matches!(err, ConciergeError::Serialization(_)));
    }
}
