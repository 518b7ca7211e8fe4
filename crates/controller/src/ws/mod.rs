/// WebSocket 模块
///
/// 管理与 Dock 的 WebSocket 连接

pub mod dock_manager;
pub mod handler;

pub use dock_manager::{DockConnection, DockConnectionManager};
pub use handler::handle_dock_websocket;
