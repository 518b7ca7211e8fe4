/// 调度控制器
///
/// 将存储卷、快照、挂载和存储池操作下发给目标 Dock，并把 Dock 的响应整理为统一结果

pub mod dock_client;
pub mod volume;

pub use dock_client::{DockClient, DockConnector, WsDockClient, WsDockConnector};
pub use volume::{normalize_response, VolumeController};
