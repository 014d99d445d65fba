use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use greenplate_engine::{traits::LedgerError, OrderFlowError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::AccountNotFound => StatusCode::FORBIDDEN,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Server-side failures are logged in full but the caller only sees a generic message;
        // raw backend or gateway payloads are nothing a client should act on.
        let message = if self.status_code().is_server_error() {
            error!("💻️ Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Login token is invalid. {0}")]
    ValidationError(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::InvalidCart(s) => Self::ValidationError(s),
            OrderFlowError::InvalidPaymentSignature => Self::ValidationError(e.to_string()),
            OrderFlowError::NotOrderOwner | OrderFlowError::OwnListingPurchase => {
                Self::AuthenticationError(AuthError::InsufficientPermissions(e.to_string()))
            },
            OrderFlowError::WrongStall { .. } => {
                Self::AuthenticationError(AuthError::InsufficientPermissions(e.to_string()))
            },
            OrderFlowError::NotCancellable(_) => Self::Conflict(e.to_string()),
            OrderFlowError::Ledger(e) => e.into(),
            OrderFlowError::Gateway(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::OrderNotFound(_) | LedgerError::ResaleItemNotFound(_) | LedgerError::UserNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            LedgerError::TransitionForbidden { .. }
            | LedgerError::ResaleItemUnavailable(_)
            | LedgerError::StaleOrderState(_)
            | LedgerError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            LedgerError::PickupCodeMismatch(_) | LedgerError::CancellationQuotaExceeded => {
                Self::ValidationError(e.to_string())
            },
            LedgerError::DatabaseError(_) | LedgerError::OrderIdNotFound(_) => Self::BackendError(e.to_string()),
        }
    }
}
