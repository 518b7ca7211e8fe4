/// 存储管理器
///
/// 按存储池名称管理驱动实例，请求未指定存储池时使用默认池

use common::models::{
    ConnectionInfo, HostInfo, StoragePoolSpec, VolumeSnapshotSpec, VolumeSpec,
};
use common::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::ceph::CephDriver;
use super::config::CephConfig;
use super::driver::StorageDriver;
use super::pool::PoolInspector;
use super::rbd::{CommandRunner, RbdCliConnector};
use super::session::RadosConnector;

/// 存储管理器
pub struct StorageManager {
    /// 存储驱动映射: pool_name -> driver
    drivers: Arc<RwLock<HashMap<String, Arc<dyn StorageDriver>>>>,
    default_pool: String,
    connector: Arc<dyn RadosConnector>,
    inspector: Arc<PoolInspector>,
    config: Arc<CephConfig>,
}

impl StorageManager {
    /// 基于命令行工具创建存储管理器
    pub fn new(
        config: CephConfig,
        runner: Arc<dyn CommandRunner>,
        default_pool: impl Into<String>,
    ) -> Self {
        let connector = Arc::new(RbdCliConnector::new(
            config.config_file.clone(),
            runner.clone(),
        ));
        Self::with_connector(config, connector, runner, default_pool)
    }

    /// 使用指定的后端连接器创建存储管理器
    pub fn with_connector(
        config: CephConfig,
        connector: Arc<dyn RadosConnector>,
        runner: Arc<dyn CommandRunner>,
        default_pool: impl Into<String>,
    ) -> Self {
        let inspector = Arc::new(PoolInspector::new(
            config.config_file.clone(),
            runner,
            config.pool.clone(),
        ));

        Self {
            drivers: Arc::new(RwLock::new(HashMap::new())),
            default_pool: default_pool.into(),
            connector,
            inspector,
            config: Arc::new(config),
        }
    }

    pub fn default_pool(&self) -> &str {
        &self.default_pool
    }

    fn resolve_pool<'a>(&'a self, pool_name: Option<&'a str>) -> &'a str {
        pool_name
            .filter(|p| !p.is_empty())
            .unwrap_or(self.default_pool.as_str())
    }

    /// 在存储池对应的驱动上执行操作
    ///
    /// 驱动在该池上第一次操作成功后才注册，不存在的池不会留在映射中
    async fn dispatch<T, F, Fut>(&self, pool_name: Option<&str>, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn StorageDriver>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let pool = self.resolve_pool(pool_name);

        let cached = self.drivers.read().await.get(pool).cloned();
        if let Some(driver) = cached {
            return op(driver).await;
        }

        let driver: Arc<dyn StorageDriver> = Arc::new(CephDriver::new(
            pool,
            self.connector.clone(),
            self.inspector.clone(),
            self.config.clone(),
        ));
        let result = op(driver.clone()).await;

        if result.is_ok() {
            let mut drivers = self.drivers.write().await;
            drivers.entry(pool.to_string()).or_insert_with(|| {
                info!("Registering storage driver for pool: {}", pool);
                driver
            });
        }
        result
    }

    /// 创建存储卷
    pub async fn create_volume(
        &self,
        pool_name: Option<&str>,
        name: &str,
        description: &str,
        size_gb: u64,
    ) -> Result<VolumeSpec> {
        debug!("Creating volume: pool={:?}, name={}, size={}GB", pool_name, name, size_gb);

        self.dispatch(pool_name, |driver| async move {
            driver.create_volume(name, description, size_gb).await
        })
        .await
    }

    /// 查询存储卷
    pub async fn pull_volume(&self, pool_name: Option<&str>, volume_id: &str) -> Result<VolumeSpec> {
        debug!("Pulling volume: pool={:?}, id={}", pool_name, volume_id);

        self.dispatch(pool_name, |driver| async move {
            driver.pull_volume(volume_id).await
        })
        .await
    }

    /// 删除存储卷
    pub async fn delete_volume(&self, pool_name: Option<&str>, volume_id: &str) -> Result<()> {
        debug!("Deleting volume: pool={:?}, id={}", pool_name, volume_id);

        self.dispatch(pool_name, |driver| async move {
            driver.delete_volume(volume_id).await
        })
        .await
    }

    /// 创建快照
    pub async fn create_snapshot(
        &self,
        pool_name: Option<&str>,
        volume_id: &str,
        name: &str,
        description: &str,
    ) -> Result<VolumeSnapshotSpec> {
        debug!("Creating snapshot: pool={:?}, volume={}, name={}", pool_name, volume_id, name);

        self.dispatch(pool_name, |driver| async move {
            driver.create_snapshot(volume_id, name, description).await
        })
        .await
    }

    /// 查询快照
    pub async fn pull_snapshot(
        &self,
        pool_name: Option<&str>,
        snapshot_id: &str,
    ) -> Result<VolumeSnapshotSpec> {
        debug!("Pulling snapshot: pool={:?}, id={}", pool_name, snapshot_id);

        self.dispatch(pool_name, |driver| async move {
            driver.pull_snapshot(snapshot_id).await
        })
        .await
    }

    /// 删除快照
    pub async fn delete_snapshot(&self, pool_name: Option<&str>, snapshot_id: &str) -> Result<()> {
        debug!("Deleting snapshot: pool={:?}, id={}", pool_name, snapshot_id);

        self.dispatch(pool_name, |driver| async move {
            driver.delete_snapshot(snapshot_id).await
        })
        .await
    }

    /// 生成挂载连接信息
    pub async fn initialize_connection(
        &self,
        pool_name: Option<&str>,
        volume_id: &str,
        host_info: &HostInfo,
    ) -> Result<ConnectionInfo> {
        self.dispatch(pool_name, |driver| async move {
            driver.initialize_connection(volume_id, host_info).await
        })
        .await
    }

    /// 撤销挂载连接
    pub async fn terminate_connection(&self, pool_name: Option<&str>, volume_id: &str) -> Result<()> {
        self.dispatch(pool_name, |driver| async move {
            driver.terminate_connection(volume_id).await
        })
        .await
    }

    /// 列出集群存储池
    pub async fn list_pools(&self) -> Result<Vec<StoragePoolSpec>> {
        self.dispatch(None, |driver| async move { driver.list_pools().await })
            .await
    }

    /// 获取已注册驱动的存储池列表
    pub async fn list_registered_pools(&self) -> Vec<String> {
        let drivers = self.drivers.read().await;
        let mut pools: Vec<String> = drivers.keys().cloned().collect();
        pools.sort();
        pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::rbd::fake::ScriptedRunner;
    use crate::storage::session::fake::{FakeCluster, FakeConnector};
    use common::Error;

    fn manager(cluster: Arc<FakeCluster>) -> StorageManager {
        StorageManager::with_connector(
            CephConfig::default(),
            Arc::new(FakeConnector(cluster)),
            Arc::new(ScriptedRunner::default()),
            "rbd",
        )
    }

    #[tokio::test]
    async fn test_routes_to_default_and_named_pools() {
        let cluster = FakeCluster::with_pools(&["rbd", "ssd"]);
        let mgr = manager(cluster.clone());

        let a = mgr.create_volume(None, "volume001", "", 1).await.unwrap();
        let b = mgr.create_volume(Some("ssd"), "volume002", "", 1).await.unwrap();

        assert_eq!(cluster.image_names("rbd").len(), 1);
        assert_eq!(cluster.image_names("ssd").len(), 1);
        assert_eq!(mgr.list_registered_pools().await, vec!["rbd", "ssd"]);

        // 卷只在所属存储池中可见
        assert!(mgr.pull_volume(None, &a.id).await.is_ok());
        assert!(matches!(
            mgr.pull_volume(None, &b.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(mgr.pull_volume(Some("ssd"), &b.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_pool_name_uses_default() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let mgr = manager(cluster.clone());

        mgr.create_volume(Some(""), "volume001", "", 1).await.unwrap();
        assert_eq!(cluster.image_names("rbd").len(), 1);
        assert_eq!(mgr.default_pool(), "rbd");
    }

    #[tokio::test]
    async fn test_failed_operations_do_not_register_pools() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let mgr = manager(cluster.clone());

        for pool in ["missing-1", "missing-2", "missing-3"] {
            assert!(matches!(
                mgr.create_volume(Some(pool), "volume001", "", 1).await,
                Err(Error::NamespaceNotFound(_))
            ));
        }
        assert!(mgr.list_registered_pools().await.is_empty());

        let missing = uuid::Uuid::new_v4().to_string();
        assert!(mgr.pull_volume(None, &missing).await.is_err());
        assert!(mgr.list_registered_pools().await.is_empty());

        mgr.create_volume(None, "volume001", "", 1).await.unwrap();
        assert_eq!(mgr.list_registered_pools().await, vec!["rbd"]);
    }
}
