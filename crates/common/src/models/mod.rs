/// 共享数据模型
///
/// 定义 Controller 和 Dock 共享的资源模型，均为按调用新建的值对象

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 存储卷
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeSpec {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// 容量（GB）
    pub size: u64,
}

/// 存储卷快照
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeSnapshotSpec {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// 所属存储卷 ID（仅引用，不拥有）
    pub volume_id: String,
    /// 容量（GB）
    pub size: u64,
}

/// 主机信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
}

/// 卷连接信息，由驱动生成，供主机侧挂载使用
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    pub driver_volume_type: String,
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// 存储卷挂载
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VolumeAttachmentSpec {
    pub id: String,
    pub volume_id: String,
    #[serde(default)]
    pub host_info: HostInfo,
    pub connection_info: ConnectionInfo,
}

/// 存储池
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoragePoolSpec {
    /// 由池名确定性派生的 ID
    pub id: String,
    pub name: String,
    /// 总容量（GB）
    pub total_capacity: u64,
    /// 可用容量（GB）
    pub free_capacity: u64,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Dock 节点描述
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockSpec {
    pub id: String,
    pub name: String,
    /// Dock 的 RPC 连接标识（节点 ID）
    pub endpoint: String,
    pub driver_name: String,
}

/// 操作状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// 删除类操作的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            code: None,
            message: message.into(),
            error: None,
        }
    }

    /// 传输层失败
    pub fn transport_failure(error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            code: None,
            message: String::new(),
            error: Some(error.into()),
        }
    }

    /// 应用层失败，携带 Dock 返回的错误码和描述
    pub fn failure(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            code: Some(code.into()),
            message: description.into(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// 常量定义
pub mod constants {
    /// 默认 Controller 端口
    pub const DEFAULT_SERVER_PORT: u16 = 3000;

    /// 默认心跳间隔（秒）
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30;

    /// 默认 Dock 离线超时（秒）
    pub const DEFAULT_DOCK_TIMEOUT: u64 = 90;

    /// 默认 RPC 调用超时（秒）
    pub const DEFAULT_RPC_TIMEOUT: u64 = 60;

    /// Ceph 驱动名称
    pub const CEPH_DRIVER_NAME: &str = "ceph";
}
