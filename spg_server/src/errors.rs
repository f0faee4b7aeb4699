use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use spg_engine::{providers::ProviderAdapterError, traits::StoreError, ActivationError, MonitorError, OrderFlowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("The order store is unavailable. {0}")]
    StoreUnavailable(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Invalid order request. {0}")]
    ValidationError(String),
    #[error("The payment provider could not be reached. {0}")]
    ProviderError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The order cannot be changed. {0}")]
    OrderStateConflict(String),
    #[error("The order was completed but needs a repair. {0}")]
    RepairRequired(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderStateConflict(_) => StatusCode::CONFLICT,
            Self::ProviderError(_) => StatusCode::BAD_GATEWAY,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RepairRequired(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Validation(e) => Self::ValidationError(e.to_string()),
            OrderFlowError::ProviderAdapter(e @ ProviderAdapterError::NotConfigured(_)) => {
                Self::ValidationError(e.to_string())
            },
            OrderFlowError::ProviderAdapter(e) => Self::ProviderError(e.to_string()),
            OrderFlowError::StoreUnavailable(e) => Self::StoreUnavailable(e.to_string()),
            OrderFlowError::ReferenceExhausted(_) => Self::Unspecified(e.to_string()),
        }
    }
}

impl From<ActivationError> for ServerError {
    fn from(e: ActivationError) -> Self {
        match e {
            ActivationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ActivationError::NotActivatable { .. } => Self::OrderStateConflict(e.to_string()),
            ActivationError::SubscriptionNotExtended { .. } => Self::RepairRequired(e.to_string()),
            ActivationError::Contention(_) => Self::StoreUnavailable(e.to_string()),
            ActivationError::StoreUnavailable(e) => Self::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<MonitorError> for ServerError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::StoreUnavailable(e) => Self::StoreUnavailable(e.to_string()),
        }
    }
}
