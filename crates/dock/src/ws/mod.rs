/// WebSocket 客户端模块
///
/// Dock 通过 WebSocket 连接到 Controller

pub mod client;
pub mod handler;

pub use client::WsClient;
pub use handler::RpcHandlerRegistry;
