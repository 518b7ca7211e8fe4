/// 存储管理
///
/// Ceph RBD 后端：名称编解码、后端会话、驱动、存储池巡检

pub mod ceph;
pub mod config;
pub mod driver;
pub mod identity;
pub mod manager;
pub mod pool;
pub mod rbd;
pub mod session;

pub use config::CephConfig;
pub use manager::StorageManager;
