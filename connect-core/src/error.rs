//! # Core Error Types
//!
//! Centralized error definitions for the connect-core crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error reported by a wallet provider in response to a request.
///
/// Mirrors the EIP-1193 `ProviderRpcError` shape: a numeric code, a
/// human readable message and optional extra data.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const REQUEST_PENDING: i64 = -32002;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    pub fn unrecognized_chain(chain_id: &str) -> Self {
        Self::new(
            Self::UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{}\".", chain_id),
        )
    }

    pub fn request_pending(method: &str) -> Self {
        Self::new(
            Self::REQUEST_PENDING,
            format!("Request of type '{}' already pending.", method),
        )
    }

    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            Self::UNSUPPORTED_METHOD,
            format!("The provider does not support '{}'.", method),
        )
    }

    pub fn disconnected() -> Self {
        Self::new(Self::DISCONNECTED, "The provider is disconnected.")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL, message)
    }

    /// Classify the error code into the recovery paths the orchestrator knows.
    pub fn kind(&self) -> ProviderErrorKind {
        match self.code {
            Self::USER_REJECTED => ProviderErrorKind::UserRejected,
            Self::UNRECOGNIZED_CHAIN => ProviderErrorKind::UnrecognizedChain,
            Self::REQUEST_PENDING => ProviderErrorKind::RequestPending,
            _ => ProviderErrorKind::Other,
        }
    }
}

/// Recovery class of a [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 4001: recovered by a full disconnect plus a user notice.
    UserRejected,
    /// 4902: recovered by registering the chain with the wallet.
    UnrecognizedChain,
    /// -32002: surfaced to the user, never retried.
    RequestPending,
    /// Anything else: logged and swallowed.
    Other,
}

/// Unified error type for connection operations.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("No wallet provider is bound")]
    NoProvider,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to subscribe to '{event}' events: {source}")]
    Subscription {
        event: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("Invalid response to {method}: {reason}")]
    InvalidResponse { method: &'static str, reason: String },

    #[error("Invalid wei amount '{value}'")]
    InvalidBalance { value: String },

    #[error("Invalid chain id '{value}'")]
    InvalidChainId { value: String },

    #[error("Chain {chain_id} is not in the network registry")]
    UnknownChain { chain_id: u64 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ConnectError {
    /// Provider error carried by this failure, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ConnectError::Provider(e) => Some(e),
            ConnectError::Subscription { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate network entry for chain {chain_id}")]
    DuplicateNetwork { chain_id: u64 },
}
