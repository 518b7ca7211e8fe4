/// 错误定义

use thiserror::Error;

use crate::ws_rpc::RpcError;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 无法连接到存储集群
    #[error("后端连接错误: {0}")]
    Connection(String),

    /// 集群中不存在指定的存储池（命名空间）
    #[error("存储池不存在: {0}")]
    NamespaceNotFound(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 后端名称无法解码，通常意味着后端数据损坏或命名冲突
    #[error("后端名称格式错误: {0}")]
    MalformedName(String),

    /// 后端拒绝了格式正确的请求，携带后端原始信息
    #[error("后端错误: {0}")]
    Backend(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    /// RPC 传输失败（连接断开、超时等）
    #[error("RPC 错误: {0}")]
    Rpc(#[from] RpcError),

    /// Dock 返回的应用层错误
    #[error("Dock 错误 [{code}]: {description}")]
    Dock { code: String, description: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
