/// WebSocket RPC 消息定义

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RpcError;

/// 消息类别，序列化为小写字符串
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    /// 单向消息，对端不回复
    Notification,
}

/// Controller 与 Dock 之间传递的一帧 JSON 消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMessage {
    /// 响应沿用请求的 ID
    pub id: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// request 和 notification 必填
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// 只有传输层失败的 response 才带此字段
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorInfo>,
}

/// 线上的错误描述，`code` 为 `RpcErrorCode` 的字符串形式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorInfo {
    pub code: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RpcMessage {
    fn build(
        id: String,
        message_type: MessageType,
        method: Option<String>,
        payload: Option<serde_json::Value>,
        error: Option<RpcErrorInfo>,
    ) -> Self {
        Self { id, message_type, method, payload, error }
    }

    /// 请求，ID 以 `req-` 开头
    pub fn request(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::build(
            format!("req-{}", Uuid::new_v4()),
            MessageType::Request,
            Some(method.into()),
            Some(payload),
            None,
        )
    }

    /// 成功响应，`id` 与请求相同
    pub fn response(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::build(id.into(), MessageType::Response, None, Some(payload), None)
    }

    /// 传输层错误响应
    pub fn error_response(
        id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        let error = RpcErrorInfo {
            code: code.into(),
            message: message.into(),
            details,
        };
        Self::build(id.into(), MessageType::Response, None, None, Some(error))
    }

    /// 通知，不等待响应
    pub fn notification(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::build(
            format!("notif-{}", Uuid::new_v4()),
            MessageType::Notification,
            Some(method.into()),
            Some(payload),
            None,
        )
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 将负载解析为指定类型，缺少负载时按 null 处理
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        let payload = self.payload.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(payload).map_err(RpcError::serialization_error)
    }

    /// 判断是否是成功响应
    pub fn is_success(&self) -> bool {
        self.message_type == MessageType::Response && self.error.is_none()
    }

    /// 判断是否是错误响应
    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Response && self.error.is_some()
    }
}
