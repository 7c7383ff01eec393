use std::fmt;

/// Error raised by an observer hook. Returning it from any hook aborts the
/// save or delete in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum EventError {
    Validation {
        message: String,
        hint: Option<String>,
    },
    Observer {
        message: String,
    },
    PropagationStopped {
        reason: String,
    },
}

impl EventError {
    pub fn validation(message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: None,
        }
    }

    pub fn validation_with_hint(message: &str, hint: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    pub fn observer(message: &str) -> Self {
        Self::Observer {
            message: message.to_string(),
        }
    }

    pub fn propagation_stopped(reason: &str) -> Self {
        Self::PropagationStopped {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Validation { message, hint } => {
                write!(f, "Validation error: {}", message)?;
                if let Some(hint) = hint {
                    write!(f, " (hint: {})", hint)?;
                }
                Ok(())
            }
            EventError::Observer { message } => write!(f, "Observer error: {}", message),
            EventError::PropagationStopped { reason } => {
                write!(f, "Event propagation stopped: {}", reason)
            }
        }
    }
}

impl std::error::Error for EventError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_with_hint_display() {
        let error = EventError::validation_with_hint("Invalid email", "Use user@domain.com");
        assert_eq!(
            error.to_string(),
            "Validation error: Invalid email (hint: Use user@domain.com)"
        );
    }

    #[test]
    fn test_propagation_stopped() {
        let error = EventError::propagation_stopped("Read-only account");
        match error {
            EventError::PropagationStopped { reason } => assert_eq!(reason, "Read-only account"),
            _ => panic!("Expected propagation stopped"),
        }
    }
}
