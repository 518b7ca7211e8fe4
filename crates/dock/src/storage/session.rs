/// 后端会话
///
/// 每个操作独立建立一次集群连接并打开目标存储池，操作结束后按相反顺序释放。
/// 句柄以 trait 形式抽象，生产环境由 `rbd` 模块基于命令行工具实现

use common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// 快照信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapInfo {
    pub id: u64,
    pub name: String,
    /// 字节数
    pub size: u64,
}

/// 集群连接工厂
pub trait RadosConnector: Send + Sync + 'static {
    /// 建立集群连接，失败返回 `Error::Connection`
    fn connect(&self) -> Result<Box<dyn ClusterConnection>>;
}

/// 已建立的集群连接
pub trait ClusterConnection: Send {
    /// 打开存储池，不存在时返回 `Error::NamespaceNotFound`
    fn open_pool(&mut self, pool: &str) -> Result<Box<dyn PoolContext>>;

    /// 关闭连接
    fn shutdown(&mut self);
}

/// 存储池上下文，所有镜像和快照操作都通过它执行
pub trait PoolContext: Send {
    fn image_names(&self) -> Result<Vec<String>>;

    fn create_image(&self, name: &str, size_bytes: u64) -> Result<()>;

    /// 镜像当前大小（字节）
    fn image_size(&self, name: &str) -> Result<u64>;

    fn remove_image(&self, name: &str) -> Result<()>;

    fn snapshots(&self, image: &str) -> Result<Vec<SnapInfo>>;

    fn create_snapshot(&self, image: &str, snap: &str) -> Result<()>;

    fn remove_snapshot(&self, image: &str, snap: &str) -> Result<()>;

    /// 释放存储池上下文
    fn destroy(&mut self);
}

/// 一次操作持有的后端会话
///
/// Drop 时先释放存储池上下文再关闭连接，任何退出路径都会执行
pub struct Session {
    pool_name: String,
    ioctx: Box<dyn PoolContext>,
    conn: Box<dyn ClusterConnection>,
}

impl Session {
    /// 连接集群并打开存储池
    pub fn open(connector: &dyn RadosConnector, pool: &str) -> Result<Self> {
        let mut conn = connector.connect()?;

        let ioctx = match conn.open_pool(pool) {
            Ok(ioctx) => ioctx,
            Err(e) => {
                conn.shutdown();
                return Err(e);
            }
        };

        debug!("Backend session opened: pool={}", pool);
        Ok(Self {
            pool_name: pool.to_string(),
            ioctx,
            conn,
        })
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn ioctx(&self) -> &dyn PoolContext {
        self.ioctx.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.ioctx.destroy();
        self.conn.shutdown();
        debug!("Backend session closed: pool={}", self.pool_name);
    }
}

/// 在阻塞线程池中打开会话并执行操作
///
/// 调用方被取消时已经开始的后端操作仍会执行完毕
pub async fn run_in_session<T, F>(
    connector: Arc<dyn RadosConnector>,
    pool: String,
    f: F,
) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Session) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let session = Session::open(connector.as_ref(), &pool)?;
        f(&session)
    })
    .await
    .map_err(|e| {
        warn!("Backend worker failed: {}", e);
        Error::Internal(format!("backend worker failed: {}", e))
    })?
}

/// 内存实现的后端，供驱动和会话测试使用
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    pub struct FakeImage {
        pub size: u64,
        pub snapshots: Vec<SnapInfo>,
    }

    #[derive(Default)]
    pub struct FakeCluster {
        pub pools: Mutex<BTreeMap<String, BTreeMap<String, FakeImage>>>,
        pub reachable: std::sync::atomic::AtomicBool,
        pub fail_create: std::sync::atomic::AtomicBool,
        /// 列快照时报错的镜像
        pub unlistable: Mutex<Vec<String>>,
        pub connects: AtomicUsize,
        pub shutdowns: AtomicUsize,
        pub opened: AtomicUsize,
        pub destroyed: AtomicUsize,
        next_snap_id: AtomicUsize,
    }

    impl FakeCluster {
        pub fn with_pools(pools: &[&str]) -> Arc<Self> {
            let cluster = Self::default();
            cluster.reachable.store(true, Ordering::SeqCst);
            {
                let mut map = cluster.pools.lock().unwrap();
                for pool in pools {
                    map.insert(pool.to_string(), BTreeMap::new());
                }
            }
            Arc::new(cluster)
        }

        pub fn insert_image(&self, pool: &str, name: &str, size: u64) {
            let mut pools = self.pools.lock().unwrap();
            pools
                .entry(pool.to_string())
                .or_default()
                .insert(name.to_string(), FakeImage { size, snapshots: Vec::new() });
        }

        pub fn image_names(&self, pool: &str) -> Vec<String> {
            let pools = self.pools.lock().unwrap();
            pools
                .get(pool)
                .map(|images| images.keys().cloned().collect())
                .unwrap_or_default()
        }

        pub fn snapshot_names(&self, pool: &str, image: &str) -> Vec<String> {
            let pools = self.pools.lock().unwrap();
            pools
                .get(pool)
                .and_then(|images| images.get(image))
                .map(|img| img.snapshots.iter().map(|s| s.name.clone()).collect())
                .unwrap_or_default()
        }
    }

    pub struct FakeConnector(pub Arc<FakeCluster>);

    impl RadosConnector for FakeConnector {
        fn connect(&self) -> Result<Box<dyn ClusterConnection>> {
            if !self.0.reachable.load(Ordering::SeqCst) {
                return Err(Error::Connection("cluster unreachable".to_string()));
            }
            self.0.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConnection(self.0.clone())))
        }
    }

    struct FakeConnection(Arc<FakeCluster>);

    impl ClusterConnection for FakeConnection {
        fn open_pool(&mut self, pool: &str) -> Result<Box<dyn PoolContext>> {
            if !self.0.pools.lock().unwrap().contains_key(pool) {
                return Err(Error::NamespaceNotFound(pool.to_string()));
            }
            self.0.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePoolContext {
                cluster: self.0.clone(),
                pool: pool.to_string(),
            }))
        }

        fn shutdown(&mut self) {
            self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakePoolContext {
        cluster: Arc<FakeCluster>,
        pool: String,
    }

    impl FakePoolContext {
        fn with_image<T>(
            &self,
            image: &str,
            f: impl FnOnce(&mut FakeImage) -> Result<T>,
        ) -> Result<T> {
            let mut pools = self.cluster.pools.lock().unwrap();
            let img = pools
                .get_mut(&self.pool)
                .and_then(|images| images.get_mut(image))
                .ok_or_else(|| Error::Backend(format!("image {} does not exist", image)))?;
            f(img)
        }
    }

    impl PoolContext for FakePoolContext {
        fn image_names(&self) -> Result<Vec<String>> {
            Ok(self.cluster.image_names(&self.pool))
        }

        fn create_image(&self, name: &str, size_bytes: u64) -> Result<()> {
            if self.cluster.fail_create.load(Ordering::SeqCst) {
                return Err(Error::Backend("rbd: create error: (28) No space left".to_string()));
            }
            self.cluster.insert_image(&self.pool, name, size_bytes);
            Ok(())
        }

        fn image_size(&self, name: &str) -> Result<u64> {
            self.with_image(name, |img| Ok(img.size))
        }

        fn remove_image(&self, name: &str) -> Result<()> {
            let mut pools = self.cluster.pools.lock().unwrap();
            pools
                .get_mut(&self.pool)
                .and_then(|images| images.remove(name))
                .map(|_| ())
                .ok_or_else(|| Error::Backend(format!("image {} does not exist", name)))
        }

        fn snapshots(&self, image: &str) -> Result<Vec<SnapInfo>> {
            if self.cluster.unlistable.lock().unwrap().iter().any(|i| i == image) {
                return Err(Error::Backend(format!("rbd: error opening image {}", image)));
            }
            self.with_image(image, |img| Ok(img.snapshots.clone()))
        }

        fn create_snapshot(&self, image: &str, snap: &str) -> Result<()> {
            let id = self.cluster.next_snap_id.fetch_add(1, Ordering::SeqCst) as u64;
            self.with_image(image, |img| {
                img.snapshots.push(SnapInfo {
                    id,
                    name: snap.to_string(),
                    size: img.size,
                });
                Ok(())
            })
        }

        fn remove_snapshot(&self, image: &str, snap: &str) -> Result<()> {
            self.with_image(image, |img| {
                let before = img.snapshots.len();
                img.snapshots.retain(|s| s.name != snap);
                if img.snapshots.len() == before {
                    return Err(Error::Backend(format!("snapshot {} does not exist", snap)));
                }
                Ok(())
            })
        }

        fn destroy(&mut self) {
            self.cluster.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_session_releases_handles_on_success() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let connector: Arc<dyn RadosConnector> = Arc::new(FakeConnector(cluster.clone()));

        let names = run_in_session(connector, "rbd".to_string(), |session| {
            assert_eq!(session.pool_name(), "rbd");
            session.ioctx().image_names()
        })
        .await
        .unwrap();

        assert!(names.is_empty());
        assert_eq!(cluster.opened.load(Ordering::SeqCst), 1);
        assert_eq!(cluster.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(cluster.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_releases_handles_on_operation_failure() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let connector: Arc<dyn RadosConnector> = Arc::new(FakeConnector(cluster.clone()));

        let result = run_in_session(connector, "rbd".to_string(), |session| {
            session.ioctx().image_size("missing")
        })
        .await;

        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(cluster.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(cluster.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_missing_pool_shuts_connection_down() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let connector = FakeConnector(cluster.clone());

        let result = Session::open(&connector, "nosuchpool");
        assert!(matches!(result, Err(Error::NamespaceNotFound(_))));
        assert_eq!(cluster.connects.load(Ordering::SeqCst), 1);
        assert_eq!(cluster.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(cluster.destroyed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_open_unreachable_cluster() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        cluster.reachable.store(false, Ordering::SeqCst);
        let connector = FakeConnector(cluster.clone());

        assert!(matches!(
            Session::open(&connector, "rbd"),
            Err(Error::Connection(_))
        ));
        assert_eq!(cluster.shutdowns.load(Ordering::SeqCst), 0);
    }
}
