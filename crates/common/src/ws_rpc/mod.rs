/// WebSocket RPC 模块
/// 
/// Controller 与 Dock 之间基于 WebSocket 的 JSON RPC 通信

pub mod message;
pub mod error;
pub mod types;
pub mod codec;

pub use message::{RpcMessage, MessageType};
pub use error::{RpcError, RpcErrorCode};
pub use types::*;
