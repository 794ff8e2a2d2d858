//! Protocol error types and broker error codes.

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("buffer truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid length prefix: {0}")]
    InvalidLength(i64),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("value too long for its length prefix: {len} bytes (max {max})")]
    ValueTooLong { len: usize, max: usize },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("correlation id {id} out of range (max {max})")]
    CorrelationIdOutOfRange { id: i32, max: i32 },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("struct {name} does not match its schema at field {field}")]
    SchemaMismatch { name: String, field: String },

    #[error("no struct codec for {0}")]
    UnknownStruct(String),

    #[error("unknown api key: {0}")]
    UnknownApiKey(i16),

    #[error("no api key for request message {0}")]
    UnknownRequest(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error(
        "failed to decode response (api_key={api_key}, correlation_id={correlation_id}, \
         {} bytes unconsumed): {source}",
        .remaining.len()
    )]
    Response {
        api_key: i16,
        correlation_id: i32,
        remaining: Bytes,
        #[source]
        source: Box<ProtocolError>,
    },
}

impl ProtocolError {
    /// Returns whether the failure was caused by running out of bytes.
    pub fn is_truncation(&self) -> bool {
        match self {
            ProtocolError::Truncated { .. } => true,
            ProtocolError::Response { source, .. } => source.is_truncation(),
            _ => false,
        }
    }
}

/// Broker error codes carried in `error_code` response fields.
///
/// Codes without a known symbol are kept as [`KafkaCode::Other`] so the
/// numeric value is never lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KafkaCode {
    Unknown,
    NoError,
    OffsetOutOfRange,
    CorruptMessage,
    UnknownTopicOrPartition,
    InvalidMessageSize,
    LeaderNotAvailable,
    NotLeaderForPartition,
    RequestTimedOut,
    BrokerNotAvailable,
    ReplicaNotAvailable,
    MessageSizeTooLarge,
    StaleControllerEpoch,
    OffsetMetadataTooLarge,
    NetworkException,
    GroupLoadInProgress,
    GroupCoordinatorNotAvailable,
    NotCoordinatorForGroup,
    InvalidTopic,
    RecordListTooLarge,
    NotEnoughReplicas,
    NotEnoughReplicasAfterAppend,
    InvalidRequiredAcks,
    IllegalGeneration,
    InconsistentGroupProtocol,
    InvalidGroupId,
    UnknownMemberId,
    InvalidSessionTimeout,
    RebalanceInProgress,
    InvalidCommitOffsetSize,
    TopicAuthorizationFailed,
    GroupAuthorizationFailed,
    ClusterAuthorizationFailed,
    Other(i16),
}

impl KafkaCode {
    /// Looks up the symbolic code for a raw wire value.
    pub fn from_code(code: i16) -> Self {
        match code {
            -1 => KafkaCode::Unknown,
            0 => KafkaCode::NoError,
            1 => KafkaCode::OffsetOutOfRange,
            2 => KafkaCode::CorruptMessage,
            3 => KafkaCode::UnknownTopicOrPartition,
            4 => KafkaCode::InvalidMessageSize,
            5 => KafkaCode::LeaderNotAvailable,
            6 => KafkaCode::NotLeaderForPartition,
            7 => KafkaCode::RequestTimedOut,
            8 => KafkaCode::BrokerNotAvailable,
            9 => KafkaCode::ReplicaNotAvailable,
            10 => KafkaCode::MessageSizeTooLarge,
            11 => KafkaCode::StaleControllerEpoch,
            12 => KafkaCode::OffsetMetadataTooLarge,
            13 => KafkaCode::NetworkException,
            14 => KafkaCode::GroupLoadInProgress,
            15 => KafkaCode::GroupCoordinatorNotAvailable,
            16 => KafkaCode::NotCoordinatorForGroup,
            17 => KafkaCode::InvalidTopic,
            18 => KafkaCode::RecordListTooLarge,
            19 => KafkaCode::NotEnoughReplicas,
            20 => KafkaCode::NotEnoughReplicasAfterAppend,
            21 => KafkaCode::InvalidRequiredAcks,
            22 => KafkaCode::IllegalGeneration,
            23 => KafkaCode::InconsistentGroupProtocol,
            24 => KafkaCode::InvalidGroupId,
            25 => KafkaCode::UnknownMemberId,
            26 => KafkaCode::InvalidSessionTimeout,
            27 => KafkaCode::RebalanceInProgress,
            28 => KafkaCode::InvalidCommitOffsetSize,
            29 => KafkaCode::TopicAuthorizationFailed,
            30 => KafkaCode::GroupAuthorizationFailed,
            31 => KafkaCode::ClusterAuthorizationFailed,
            other => KafkaCode::Other(other),
        }
    }

    /// Returns the raw wire value.
    pub fn code(&self) -> i16 {
        match self {
            KafkaCode::Unknown => -1,
            KafkaCode::NoError => 0,
            KafkaCode::OffsetOutOfRange => 1,
            KafkaCode::CorruptMessage => 2,
            KafkaCode::UnknownTopicOrPartition => 3,
            KafkaCode::InvalidMessageSize => 4,
            KafkaCode::LeaderNotAvailable => 5,
            KafkaCode::NotLeaderForPartition => 6,
            KafkaCode::RequestTimedOut => 7,
            KafkaCode::BrokerNotAvailable => 8,
            KafkaCode::ReplicaNotAvailable => 9,
            KafkaCode::MessageSizeTooLarge => 10,
            KafkaCode::StaleControllerEpoch => 11,
            KafkaCode::OffsetMetadataTooLarge => 12,
            KafkaCode::NetworkException => 13,
            KafkaCode::GroupLoadInProgress => 14,
            KafkaCode::GroupCoordinatorNotAvailable => 15,
            KafkaCode::NotCoordinatorForGroup => 16,
            KafkaCode::InvalidTopic => 17,
            KafkaCode::RecordListTooLarge => 18,
            KafkaCode::NotEnoughReplicas => 19,
            KafkaCode::NotEnoughReplicasAfterAppend => 20,
            KafkaCode::InvalidRequiredAcks => 21,
            KafkaCode::IllegalGeneration => 22,
            KafkaCode::InconsistentGroupProtocol => 23,
            KafkaCode::InvalidGroupId => 24,
            KafkaCode::UnknownMemberId => 25,
            KafkaCode::InvalidSessionTimeout => 26,
            KafkaCode::RebalanceInProgress => 27,
            KafkaCode::InvalidCommitOffsetSize => 28,
            KafkaCode::TopicAuthorizationFailed => 29,
            KafkaCode::GroupAuthorizationFailed => 30,
            KafkaCode::ClusterAuthorizationFailed => 31,
            KafkaCode::Other(code) => *code,
        }
    }

    /// Returns whether a request that failed with this code may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KafkaCode::CorruptMessage
                | KafkaCode::UnknownTopicOrPartition
                | KafkaCode::LeaderNotAvailable
                | KafkaCode::NotLeaderForPartition
                | KafkaCode::RequestTimedOut
                | KafkaCode::NetworkException
                | KafkaCode::GroupLoadInProgress
                | KafkaCode::GroupCoordinatorNotAvailable
                | KafkaCode::NotCoordinatorForGroup
                | KafkaCode::NotEnoughReplicas
                | KafkaCode::NotEnoughReplicasAfterAppend
        )
    }

    pub fn is_error(&self) -> bool {
        *self != KafkaCode::NoError
    }
}

impl fmt::Display for KafkaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KafkaCode::Unknown => write!(f, "UNKNOWN"),
            KafkaCode::NoError => write!(f, "NO_ERROR"),
            KafkaCode::OffsetOutOfRange => write!(f, "OFFSET_OUT_OF_RANGE"),
            KafkaCode::CorruptMessage => write!(f, "CORRUPT_MESSAGE"),
            KafkaCode::UnknownTopicOrPartition => write!(f, "UNKNOWN_TOPIC_OR_PARTITION"),
            KafkaCode::InvalidMessageSize => write!(f, "INVALID_MESSAGE_SIZE"),
            KafkaCode::LeaderNotAvailable => write!(f, "LEADER_NOT_AVAILABLE"),
            KafkaCode::NotLeaderForPartition => write!(f, "NOT_LEADER_FOR_PARTITION"),
            KafkaCode::RequestTimedOut => write!(f, "REQUEST_TIMED_OUT"),
            KafkaCode::BrokerNotAvailable => write!(f, "BROKER_NOT_AVAILABLE"),
            KafkaCode::ReplicaNotAvailable => write!(f, "REPLICA_NOT_AVAILABLE"),
            KafkaCode::MessageSizeTooLarge => write!(f, "MESSAGE_SIZE_TOO_LARGE"),
            KafkaCode::StaleControllerEpoch => write!(f, "STALE_CONTROLLER_EPOCH"),
            KafkaCode::OffsetMetadataTooLarge => write!(f, "OFFSET_METADATA_TOO_LARGE"),
            KafkaCode::NetworkException => write!(f, "NETWORK_EXCEPTION"),
            KafkaCode::GroupLoadInProgress => write!(f, "GROUP_LOAD_IN_PROGRESS"),
            KafkaCode::GroupCoordinatorNotAvailable => {
                write!(f, "GROUP_COORDINATOR_NOT_AVAILABLE")
            }
            KafkaCode::NotCoordinatorForGroup => write!(f, "NOT_COORDINATOR_FOR_GROUP"),
            KafkaCode::InvalidTopic => write!(f, "INVALID_TOPIC"),
            KafkaCode::RecordListTooLarge => write!(f, "RECORD_LIST_TOO_LARGE"),
            KafkaCode::NotEnoughReplicas => write!(f, "NOT_ENOUGH_REPLICAS"),
            KafkaCode::NotEnoughReplicasAfterAppend => {
                write!(f, "NOT_ENOUGH_REPLICAS_AFTER_APPEND")
            }
            KafkaCode::InvalidRequiredAcks => write!(f, "INVALID_REQUIRED_ACKS"),
            KafkaCode::IllegalGeneration => write!(f, "ILLEGAL_GENERATION"),
            KafkaCode::InconsistentGroupProtocol => write!(f, "INCONSISTENT_GROUP_PROTOCOL"),
            KafkaCode::InvalidGroupId => write!(f, "INVALID_GROUP_ID"),
            KafkaCode::UnknownMemberId => write!(f, "UNKNOWN_MEMBER_ID"),
            KafkaCode::InvalidSessionTimeout => write!(f, "INVALID_SESSION_TIMEOUT"),
            KafkaCode::RebalanceInProgress => write!(f, "REBALANCE_IN_PROGRESS"),
            KafkaCode::InvalidCommitOffsetSize => write!(f, "INVALID_COMMIT_OFFSET_SIZE"),
            KafkaCode::TopicAuthorizationFailed => write!(f, "TOPIC_AUTHORIZATION_FAILED"),
            KafkaCode::GroupAuthorizationFailed => write!(f, "GROUP_AUTHORIZATION_FAILED"),
            KafkaCode::ClusterAuthorizationFailed => write!(f, "CLUSTER_AUTHORIZATION_FAILED"),
            KafkaCode::Other(code) => write!(f, "ERROR_{}", code),
        }
    }
}

impl Serialize for KafkaCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kafka_code_roundtrip() {
        for raw in -1..=31 {
            let code = KafkaCode::from_code(raw);
            assert!(!matches!(code, KafkaCode::Other(_)), "code {} unmapped", raw);
            assert_eq!(code.code(), raw);
        }
    }

    #[test]
    fn test_kafka_code_unmapped() {
        let code = KafkaCode::from_code(87);
        assert_eq!(code, KafkaCode::Other(87));
        assert_eq!(code.code(), 87);
        assert_eq!(code.to_string(), "ERROR_87");
    }

    #[test]
    fn test_kafka_code_retryable() {
        assert!(KafkaCode::LeaderNotAvailable.is_retryable());
        assert!(KafkaCode::NotLeaderForPartition.is_retryable());
        assert!(KafkaCode::RequestTimedOut.is_retryable());

        assert!(!KafkaCode::NoError.is_retryable());
        assert!(!KafkaCode::OffsetOutOfRange.is_retryable());
        assert!(!KafkaCode::TopicAuthorizationFailed.is_retryable());
    }

    #[test]
    fn test_kafka_code_display() {
        assert_eq!(KafkaCode::NoError.to_string(), "NO_ERROR");
        assert_eq!(
            KafkaCode::UnknownTopicOrPartition.to_string(),
            "UNKNOWN_TOPIC_OR_PARTITION"
        );
        assert_eq!(KafkaCode::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_kafka_code_serialization() {
        let json = serde_json::to_string(&KafkaCode::OffsetOutOfRange).unwrap();
        assert_eq!(json, "\"OFFSET_OUT_OF_RANGE\"");
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Truncated {
            needed: 8,
            remaining: 3,
        };
        assert!(err.to_string().contains('8'));
        assert!(err.to_string().contains('3'));

        let err = ProtocolError::CrcMismatch {
            expected: 0xABC,
            actual: 0xDEF,
        };
        let msg = err.to_string();
        assert!(msg.contains("abc") || msg.contains("ABC"));

        let err = ProtocolError::CorrelationIdOutOfRange {
            id: 1 << 24,
            max: (1 << 24) - 1,
        };
        assert!(err.to_string().contains("16777216"));
    }

    #[test]
    fn test_response_error_context() {
        let err = ProtocolError::Response {
            api_key: 3,
            correlation_id: 42,
            remaining: Bytes::from_static(&[1, 2, 3]),
            source: Box::new(ProtocolError::Truncated {
                needed: 4,
                remaining: 3,
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("api_key=3"));
        assert!(msg.contains("correlation_id=42"));
        assert!(msg.contains("3 bytes unconsumed"));
        assert!(err.is_truncation());
        assert!(std::error::Error::source(&err).is_some());
    }
}
