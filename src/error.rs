// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types and pingback fault codes.

use thiserror::Error;
use uuid::Uuid;

/// Fault codes from the pingback protocol (plus the XML-RPC method fault).
///
/// The integer values are fixed by the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// No fault; used by success responses
    None,
    /// Generic error
    Generic,
    /// The source URI does not exist
    SourceNotExist,
    /// The source URI does not contain a link to the target URI
    SourceNotContainTargetUri,
    /// The target URI does not exist
    TargetNotExist,
    /// The target URI cannot be used as a target
    TargetNotPingable,
    /// The pingback has already been registered
    AlreadyRegistered,
    /// Access denied
    AccessDenied,
    /// Requested XML-RPC method not found
    MethodNotFound,
}

impl FaultCode {
    /// Wire value of the fault code.
    pub fn code(self) -> i32 {
        match self {
            Self::None | Self::Generic => 0,
            Self::SourceNotExist => 16,
            Self::SourceNotContainTargetUri => 17,
            Self::TargetNotExist => 32,
            Self::TargetNotPingable => 33,
            Self::AlreadyRegistered => 48,
            Self::AccessDenied => 49,
            Self::MethodNotFound => -32601,
        }
    }
}

/// Errors a pingback can be rejected with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PingbackError {
    #[error("Malformed pingback request: {0}")]
    MalformedRequest(String),

    #[error("Requested method not found: {0}")]
    UnknownMethod(String),

    #[error("Invalid URI for {param}: {uri}")]
    InvalidUri { param: &'static str, uri: String },

    #[error("Self-ping blocked for host {host}")]
    SelfPing { host: String },

    #[error("The source URI does not exist: {0}")]
    SourceNotExist(String),

    #[error("The source URI does not contain a link to the target URI")]
    SourceNotContainTargetUri,

    #[error("The specified target URI does not exist")]
    TargetNotExist,

    #[error("The specified target URI cannot be used as a target")]
    TargetNotPingable,

    #[error("The pingback has already been registered")]
    AlreadyRegistered,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Pingback record not found: {0}")]
    NotFound(Uuid),
}

impl PingbackError {
    /// Fault code reported to the remote client for this error.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::MalformedRequest(_)
            | Self::InvalidUri { .. }
            | Self::SelfPing { .. }
            | Self::Storage(_)
            | Self::NotFound(_) => FaultCode::Generic,
            Self::UnknownMethod(_) => FaultCode::MethodNotFound,
            Self::SourceNotExist(_) => FaultCode::SourceNotExist,
            Self::SourceNotContainTargetUri => FaultCode::SourceNotContainTargetUri,
            Self::TargetNotExist => FaultCode::TargetNotExist,
            Self::TargetNotPingable => FaultCode::TargetNotPingable,
            Self::AlreadyRegistered => FaultCode::AlreadyRegistered,
            Self::AccessDenied(_) => FaultCode::AccessDenied,
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "malformed_request",
            Self::UnknownMethod(_) => "unknown_method",
            Self::InvalidUri { .. } => "invalid_uri",
            Self::SelfPing { .. } => "self_ping",
            Self::SourceNotExist(_) => "source_not_exist",
            Self::SourceNotContainTargetUri => "source_not_contain_target",
            Self::TargetNotExist => "target_not_exist",
            Self::TargetNotPingable => "target_not_pingable",
            Self::AlreadyRegistered => "already_registered",
            Self::AccessDenied(_) => "access_denied",
            Self::Storage(_) => "storage_error",
            Self::NotFound(_) => "not_found",
        }
    }
}

/// Errors raised by storage and lookup collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The (source, target) pair is already stored
    #[error("Pingback already stored for {source_uri} -> {target_uri}")]
    Duplicate {
        source_uri: String,
        target_uri: String,
    },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for PingbackError {
    fn from(err: StoreError) -> Self {
        PingbackError::Storage(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PingbackError>;
