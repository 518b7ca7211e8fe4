/// Easy SDS - 公共库
/// 
/// 提供 Controller 和 Dock 共享的数据模型、错误处理、容量换算以及 RPC 消息定义

pub mod errors;
pub mod models;
pub mod utils;
pub mod ws_rpc;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use ws_rpc::{RpcMessage, RpcError, RpcErrorCode, MessageType};
