/// 应用全局状态

use std::time::Duration;

use crate::controller::{VolumeController, WsDockConnector};
use crate::ws::DockConnectionManager;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// Dock WebSocket 连接管理器
    pub dock_manager: DockConnectionManager,
    /// 单次 Dock 调用超时
    pub rpc_timeout: Duration,
}

impl AppState {
    pub fn new(dock_manager: DockConnectionManager, rpc_timeout: Duration) -> Self {
        Self {
            dock_manager,
            rpc_timeout,
        }
    }

    /// 获取 Dock 连接管理器
    pub fn dock_manager(&self) -> DockConnectionManager {
        self.dock_manager.clone()
    }

    /// 创建经由 WebSocket 下发请求的卷控制器
    pub fn volume_controller(&self) -> VolumeController<WsDockConnector> {
        VolumeController::new(WsDockConnector::new(
            self.dock_manager.clone(),
            self.rpc_timeout,
        ))
    }
}
