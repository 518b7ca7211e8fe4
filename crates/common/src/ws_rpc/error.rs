/// WebSocket RPC 错误定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// RPC 错误码
///
/// 同一套错误码既用于传输层错误（RpcMessage.error），
/// 也用于 Dock 业务错误（DockResponse.error.code）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RpcErrorCode {
    // 通用错误
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Timeout,
    ConnectionClosed,
    SerializationError,

    // 存储业务错误
    BackendConnectionError,
    NamespaceNotFound,
    MalformedName,

    VolumeNotFound,
    VolumeCreateFailed,
    VolumeDeleteFailed,
    VolumeQueryFailed,

    SnapshotNotFound,
    SnapshotCreateFailed,
    SnapshotDeleteFailed,
    SnapshotQueryFailed,

    AttachmentCreateFailed,
    AttachmentDeleteFailed,

    PoolListFailed,

    NodeNotFound,
    NodeOffline,
}

impl RpcErrorCode {
    /// 转换为字符串码
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::SerializationError => "SERIALIZATION_ERROR",

            Self::BackendConnectionError => "BACKEND_CONNECTION_ERROR",
            Self::NamespaceNotFound => "NAMESPACE_NOT_FOUND",
            Self::MalformedName => "MALFORMED_NAME",

            Self::VolumeNotFound => "VOLUME_NOT_FOUND",
            Self::VolumeCreateFailed => "VOLUME_CREATE_FAILED",
            Self::VolumeDeleteFailed => "VOLUME_DELETE_FAILED",
            Self::VolumeQueryFailed => "VOLUME_QUERY_FAILED",

            Self::SnapshotNotFound => "SNAPSHOT_NOT_FOUND",
            Self::SnapshotCreateFailed => "SNAPSHOT_CREATE_FAILED",
            Self::SnapshotDeleteFailed => "SNAPSHOT_DELETE_FAILED",
            Self::SnapshotQueryFailed => "SNAPSHOT_QUERY_FAILED",

            Self::AttachmentCreateFailed => "ATTACHMENT_CREATE_FAILED",
            Self::AttachmentDeleteFailed => "ATTACHMENT_DELETE_FAILED",

            Self::PoolListFailed => "POOL_LIST_FAILED",

            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::NodeOffline => "NODE_OFFLINE",
        }
    }

    /// 从字符串码解析，未知码返回 None
    pub fn from_code(code: &str) -> Option<Self> {
        let parsed = match code {
            "INVALID_REQUEST" => Self::InvalidRequest,
            "METHOD_NOT_FOUND" => Self::MethodNotFound,
            "INVALID_PARAMS" => Self::InvalidParams,
            "INTERNAL_ERROR" => Self::InternalError,
            "TIMEOUT" => Self::Timeout,
            "CONNECTION_CLOSED" => Self::ConnectionClosed,
            "SERIALIZATION_ERROR" => Self::SerializationError,
            "BACKEND_CONNECTION_ERROR" => Self::BackendConnectionError,
            "NAMESPACE_NOT_FOUND" => Self::NamespaceNotFound,
            "MALFORMED_NAME" => Self::MalformedName,
            "VOLUME_NOT_FOUND" => Self::VolumeNotFound,
            "VOLUME_CREATE_FAILED" => Self::VolumeCreateFailed,
            "VOLUME_DELETE_FAILED" => Self::VolumeDeleteFailed,
            "VOLUME_QUERY_FAILED" => Self::VolumeQueryFailed,
            "SNAPSHOT_NOT_FOUND" => Self::SnapshotNotFound,
            "SNAPSHOT_CREATE_FAILED" => Self::SnapshotCreateFailed,
            "SNAPSHOT_DELETE_FAILED" => Self::SnapshotDeleteFailed,
            "SNAPSHOT_QUERY_FAILED" => Self::SnapshotQueryFailed,
            "ATTACHMENT_CREATE_FAILED" => Self::AttachmentCreateFailed,
            "ATTACHMENT_DELETE_FAILED" => Self::AttachmentDeleteFailed,
            "POOL_LIST_FAILED" => Self::PoolListFailed,
            "NODE_NOT_FOUND" => Self::NodeNotFound,
            "NODE_OFFLINE" => Self::NodeOffline,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RPC 错误
#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl RpcError {
    /// 创建新的 RPC 错误
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// 无效请求错误
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    /// 方法不存在错误
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::MethodNotFound,
            format!("方法不存在: {}", method.into()),
        )
    }

    /// 参数错误
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    /// 内部错误
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalError, message)
    }

    /// 超时错误
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Timeout, message)
    }

    /// 连接关闭错误
    pub fn connection_closed() -> Self {
        Self::new(RpcErrorCode::ConnectionClosed, "连接已关闭")
    }

    /// 序列化错误
    pub fn serialization_error(err: impl fmt::Display) -> Self {
        Self::new(
            RpcErrorCode::SerializationError,
            format!("序列化错误: {}", err),
        )
    }

    /// 节点不存在
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::NodeNotFound,
            format!("节点不存在: {}", node_id.into()),
        )
    }

    /// 节点离线
    pub fn node_offline(node_id: impl Into<String>) -> Self {
        Self::new(
            RpcErrorCode::NodeOffline,
            format!("节点离线: {}", node_id.into()),
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err)
    }
}
