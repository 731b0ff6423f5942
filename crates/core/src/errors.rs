use thiserror::Error;

use crate::domain::result::StructuredResult;

pub const MISSING_COMMAND_MESSAGE: &str = "No command provided";

/// Failures surfaced at the request boundary. Business outcomes such as an
/// unknown contact never end up here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn missing_command(correlation_id: impl Into<String>) -> Self {
        Self::BadRequest {
            message: MISSING_COMMAND_MESSAGE.to_owned(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn internal(details: impl std::fmt::Display, correlation_id: impl Into<String>) -> Self {
        Self::Internal { message: format!("Error: {details}"), correlation_id: correlation_id.into() }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::Internal { message, .. } => message,
        }
    }

    pub fn into_result(self) -> StructuredResult {
        match self {
            Self::BadRequest { message, .. } | Self::Internal { message, .. } => {
                StructuredResult::message_only(message)
            }
        }
    }
}
