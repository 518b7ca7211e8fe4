/// 存储驱动抽象层
///
/// 定义统一的存储驱动接口，一个驱动实例对应一个存储池

use async_trait::async_trait;
use common::models::{
    ConnectionInfo, HostInfo, StoragePoolSpec, VolumeSnapshotSpec, VolumeSpec,
};
use common::Result;

/// 存储驱动 Trait
#[async_trait]
pub trait StorageDriver: Send + Sync + 'static {
    /// 创建存储卷，容量单位 GB
    async fn create_volume(
        &self,
        name: &str,
        description: &str,
        size_gb: u64,
    ) -> Result<VolumeSpec>;

    /// 查询存储卷
    async fn pull_volume(&self, volume_id: &str) -> Result<VolumeSpec>;

    /// 删除存储卷
    async fn delete_volume(&self, volume_id: &str) -> Result<()>;

    /// 创建快照
    async fn create_snapshot(
        &self,
        volume_id: &str,
        name: &str,
        description: &str,
    ) -> Result<VolumeSnapshotSpec>;

    /// 查询快照
    async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshotSpec>;

    /// 删除快照
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;

    /// 生成主机挂载所需的连接信息
    async fn initialize_connection(
        &self,
        volume_id: &str,
        host_info: &HostInfo,
    ) -> Result<ConnectionInfo>;

    /// 撤销连接
    async fn terminate_connection(&self, volume_id: &str) -> Result<()>;

    /// 列出后端存储池
    async fn list_pools(&self) -> Result<Vec<StoragePoolSpec>>;

    /// 获取存储驱动类型
    fn driver_type(&self) -> &str;
}
