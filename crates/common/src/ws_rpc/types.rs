/// WebSocket RPC 数据类型定义
///
/// Controller 与 Dock 之间的请求参数和响应结构

use serde::{Deserialize, Serialize};

use crate::models::{HostInfo, StoragePoolSpec};

/// Dock 支持的 RPC 方法名
pub mod methods {
    pub const REGISTER: &str = "register";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const POOL_INVENTORY: &str = "pool_inventory";

    pub const CREATE_VOLUME: &str = "create_volume";
    pub const PULL_VOLUME: &str = "pull_volume";
    pub const DELETE_VOLUME: &str = "delete_volume";
    pub const CREATE_ATTACHMENT: &str = "create_attachment";
    pub const DELETE_ATTACHMENT: &str = "delete_attachment";
    pub const CREATE_VOLUME_SNAPSHOT: &str = "create_volume_snapshot";
    pub const PULL_VOLUME_SNAPSHOT: &str = "pull_volume_snapshot";
    pub const DELETE_VOLUME_SNAPSHOT: &str = "delete_volume_snapshot";
    pub const LIST_POOLS: &str = "list_pools";
}

// ============================================================================
// 心跳相关
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub timestamp: i64,
}

// ============================================================================
// Dock 注册
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub node_id: String,
    pub hostname: String,
    pub ip_address: String,
    pub driver_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// 存储池上报
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInventory {
    pub node_id: String,
    pub pools: Vec<StoragePoolSpec>,
    pub timestamp: i64,
}

// ============================================================================
// 存储卷管理
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeOpts {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 容量（GB）
    pub size: u64,
    /// 目标存储池，缺省时使用 Dock 的默认池
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullVolumeOpts {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVolumeOpts {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

// ============================================================================
// 挂载管理
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAttachmentOpts {
    pub volume_id: String,
    #[serde(default)]
    pub host_info: HostInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAttachmentOpts {
    pub id: String,
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

// ============================================================================
// 快照管理
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeSnapshotOpts {
    pub volume_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullVolumeSnapshotOpts {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVolumeSnapshotOpts {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

// ============================================================================
// 存储池查询
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPoolsOpts {}

// ============================================================================
// Dock 通用响应
// ============================================================================

/// Dock 业务错误
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockError {
    pub code: String,
    pub description: String,
}

/// Dock 业务结果，`message` 为 JSON 编码的资源对象
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockResult {
    pub message: String,
}

/// Dock 对每个业务调用的响应
///
/// 业务失败也通过传输层成功返回，错误放在 `error` 中
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DockError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DockResult>,
}

impl DockResponse {
    /// 成功响应，将资源对象编码为 JSON 字符串
    pub fn ok<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            error: None,
            result: Some(DockResult {
                message: serde_json::to_string(value)?,
            }),
        })
    }

    /// 不携带资源对象的成功响应
    pub fn empty() -> Self {
        Self {
            error: None,
            result: Some(DockResult {
                message: String::new(),
            }),
        }
    }

    /// 业务错误响应
    pub fn fail(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: Some(DockError {
                code: code.into(),
                description: description.into(),
            }),
            result: None,
        }
    }
}
