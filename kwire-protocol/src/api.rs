//! API keys and the struct names of their v0 request and response bodies.

use crate::error::ProtocolError;
use serde::Serialize;
use std::fmt;

/// APIs this codec carries schemas for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKey {
    Produce,
    Fetch,
    ListOffsets,
    Metadata,
    OffsetCommit,
    OffsetFetch,
    GroupCoordinator,
}

impl ApiKey {
    pub const ALL: [ApiKey; 7] = [
        ApiKey::Produce,
        ApiKey::Fetch,
        ApiKey::ListOffsets,
        ApiKey::Metadata,
        ApiKey::OffsetCommit,
        ApiKey::OffsetFetch,
        ApiKey::GroupCoordinator,
    ];

    /// Returns the numeric key sent in request headers.
    pub fn code(&self) -> i16 {
        match self {
            ApiKey::Produce => 0,
            ApiKey::Fetch => 1,
            ApiKey::ListOffsets => 2,
            ApiKey::Metadata => 3,
            ApiKey::OffsetCommit => 8,
            ApiKey::OffsetFetch => 9,
            ApiKey::GroupCoordinator => 10,
        }
    }

    pub fn from_code(code: i16) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|api| api.code() == code)
            .ok_or(ProtocolError::UnknownApiKey(code))
    }

    pub fn request_name(&self) -> &'static str {
        match self {
            ApiKey::Produce => "produce_request",
            ApiKey::Fetch => "fetch_request",
            ApiKey::ListOffsets => "list_offsets_request",
            ApiKey::Metadata => "metadata_request",
            ApiKey::OffsetCommit => "offset_commit_request",
            ApiKey::OffsetFetch => "offset_fetch_request",
            ApiKey::GroupCoordinator => "group_coordinator_request",
        }
    }

    pub fn response_name(&self) -> &'static str {
        match self {
            ApiKey::Produce => "produce_response",
            ApiKey::Fetch => "fetch_response",
            ApiKey::ListOffsets => "list_offsets_response",
            ApiKey::Metadata => "metadata_response",
            ApiKey::OffsetCommit => "offset_commit_response",
            ApiKey::OffsetFetch => "offset_fetch_response",
            ApiKey::GroupCoordinator => "group_coordinator_response",
        }
    }

    /// Looks up the API whose request body is the struct `name`.
    pub fn from_request_name(name: &str) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|api| api.request_name() == name)
            .ok_or_else(|| ProtocolError::UnknownRequest(name.to_string()))
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiKey::Produce => "Produce",
            ApiKey::Fetch => "Fetch",
            ApiKey::ListOffsets => "ListOffsets",
            ApiKey::Metadata => "Metadata",
            ApiKey::OffsetCommit => "OffsetCommit",
            ApiKey::OffsetFetch => "OffsetFetch",
            ApiKey::GroupCoordinator => "GroupCoordinator",
        };
        f.write_str(name)
    }
}
