/// Ceph RBD 存储驱动
///
/// 把编排层的卷/快照模型映射为 RBD 镜像和镜像快照。
/// 镜像名中编码了资源 ID（见 `identity`），驱动本身不保存任何状态，
/// 每次操作都重新列出后端对象并解析

use async_trait::async_trait;
use common::models::{
    constants::CEPH_DRIVER_NAME, ConnectionInfo, HostInfo, StoragePoolSpec, VolumeSnapshotSpec,
    VolumeSpec,
};
use common::utils::capacity::{gb_to_bytes, to_canonical_gb};
use common::{Error, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CephConfig;
use super::driver::StorageDriver;
use super::identity::{self, BackendName, NAMESPACE_TAG};
use super::pool::PoolInspector;
use super::session::{run_in_session, RadosConnector, Session, SnapInfo};

/// 按错误类型选择日志级别
fn log_failure(op: &str, target: &str, err: &Error) {
    match err {
        Error::NotFound(_) => debug!("{} {}: not found", op, target),
        _ => warn!("{} {} failed: {}", op, target, err),
    }
}

/// 快照查找结果
struct FoundSnapshot {
    parent: BackendName,
    parent_name: String,
    snap: SnapInfo,
    decoded: BackendName,
}

/// 遍历所有可解码的卷，在其快照列表中查找指定 ID
fn find_snapshot(session: &Session, snapshot_id: &Uuid) -> Result<FoundSnapshot> {
    let ioctx = session.ioctx();
    for image in ioctx.image_names()? {
        let Ok(parent) = identity::decode(&image) else {
            continue;
        };

        let snaps = match ioctx.snapshots(&image) {
            Ok(snaps) => snaps,
            Err(e) => {
                debug!("Skipping image {} while scanning snapshots: {}", image, e);
                continue;
            }
        };
        let snap_names: Vec<String> = snaps.iter().map(|s| s.name.clone()).collect();
        match identity::resolve(snapshot_id, &snap_names) {
            Ok(snap_name) => {
                let decoded = identity::decode(&snap_name)?;
                let snap = snaps
                    .into_iter()
                    .find(|s| s.name == snap_name)
                    .ok_or_else(|| Error::NotFound(snapshot_id.to_string()))?;
                return Ok(FoundSnapshot {
                    parent,
                    parent_name: image,
                    snap,
                    decoded,
                });
            }
            Err(Error::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(Error::NotFound(snapshot_id.to_string()))
}

/// Ceph 存储驱动，一个实例对应一个存储池
pub struct CephDriver {
    pool: String,
    connector: Arc<dyn RadosConnector>,
    inspector: Arc<PoolInspector>,
    config: Arc<CephConfig>,
}

impl CephDriver {
    pub fn new(
        pool: impl Into<String>,
        connector: Arc<dyn RadosConnector>,
        inspector: Arc<PoolInspector>,
        config: Arc<CephConfig>,
    ) -> Self {
        Self {
            pool: pool.into(),
            connector,
            inspector,
            config,
        }
    }

    async fn session<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> Result<T> + Send + 'static,
    {
        run_in_session(self.connector.clone(), self.pool.clone(), f).await
    }
}

#[async_trait]
impl StorageDriver for CephDriver {
    async fn create_volume(
        &self,
        name: &str,
        description: &str,
        size_gb: u64,
    ) -> Result<VolumeSpec> {
        info!(
            "Creating rbd volume: pool={}, name={}, size={}GB",
            self.pool, name, size_gb
        );

        let id = Uuid::new_v4();
        let backend_name = identity::encode(NAMESPACE_TAG, name, &id)?;
        let size_bytes = gb_to_bytes(size_gb)?;

        self.session(move |s| s.ioctx().create_image(&backend_name, size_bytes))
            .await
            .inspect_err(|e| log_failure("Create volume", name, e))?;

        info!("Successfully created volume {} ({})", id, name);
        Ok(VolumeSpec {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            size: to_canonical_gb(size_bytes),
        })
    }

    async fn pull_volume(&self, volume_id: &str) -> Result<VolumeSpec> {
        debug!("Pulling rbd volume: pool={}, id={}", self.pool, volume_id);

        let id = identity::parse_id(volume_id)?;
        self.session(move |s| {
            let ioctx = s.ioctx();
            let names = ioctx.image_names()?;
            let backend_name = identity::resolve(&id, &names)?;
            let size = ioctx.image_size(&backend_name)?;
            let decoded = identity::decode(&backend_name)?;

            Ok(VolumeSpec {
                id: decoded.id.to_string(),
                name: decoded.display_name,
                description: String::new(),
                size: to_canonical_gb(size),
            })
        })
        .await
        .inspect_err(|e| log_failure("Pull volume", volume_id, e))
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        info!("Deleting rbd volume: pool={}, id={}", self.pool, volume_id);

        let id = identity::parse_id(volume_id)?;
        self.session(move |s| {
            let ioctx = s.ioctx();
            let names = ioctx.image_names()?;
            let backend_name = identity::resolve(&id, &names)?;
            ioctx.remove_image(&backend_name)
        })
        .await
        .inspect_err(|e| log_failure("Delete volume", volume_id, e))?;

        info!("Successfully deleted volume {}", volume_id);
        Ok(())
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        name: &str,
        description: &str,
    ) -> Result<VolumeSnapshotSpec> {
        info!(
            "Creating rbd snapshot: pool={}, volume={}, name={}",
            self.pool, volume_id, name
        );

        let parent_id = identity::parse_id(volume_id)?;
        let snap_id = Uuid::new_v4();
        let snap_name = identity::encode(NAMESPACE_TAG, name, &snap_id)?;

        let size = self
            .session(move |s| {
                let ioctx = s.ioctx();
                let names = ioctx.image_names()?;
                let parent = identity::resolve(&parent_id, &names)?;
                let size = ioctx.image_size(&parent)?;
                ioctx.create_snapshot(&parent, &snap_name)?;
                Ok(size)
            })
            .await
            .inspect_err(|e| log_failure("Create snapshot of", volume_id, e))?;

        info!("Successfully created snapshot {} of volume {}", snap_id, volume_id);
        Ok(VolumeSnapshotSpec {
            id: snap_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            volume_id: parent_id.to_string(),
            size: to_canonical_gb(size),
        })
    }

    async fn pull_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshotSpec> {
        debug!("Pulling rbd snapshot: pool={}, id={}", self.pool, snapshot_id);

        let id = identity::parse_id(snapshot_id)?;
        self.session(move |s| {
            let found = find_snapshot(s, &id)?;
            Ok(VolumeSnapshotSpec {
                id: found.decoded.id.to_string(),
                name: found.decoded.display_name,
                description: String::new(),
                volume_id: found.parent.id.to_string(),
                size: to_canonical_gb(found.snap.size),
            })
        })
        .await
        .inspect_err(|e| log_failure("Pull snapshot", snapshot_id, e))
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        info!("Deleting rbd snapshot: pool={}, id={}", self.pool, snapshot_id);

        let id = identity::parse_id(snapshot_id)?;
        self.session(move |s| {
            let found = find_snapshot(s, &id)?;
            s.ioctx().remove_snapshot(&found.parent_name, &found.snap.name)
        })
        .await
        .inspect_err(|e| log_failure("Delete snapshot", snapshot_id, e))?;

        info!("Successfully deleted snapshot {}", snapshot_id);
        Ok(())
    }

    async fn initialize_connection(
        &self,
        volume_id: &str,
        host_info: &HostInfo,
    ) -> Result<ConnectionInfo> {
        info!(
            "Initializing connection: pool={}, volume={}, host={:?}",
            self.pool, volume_id, host_info.host
        );

        let id = identity::parse_id(volume_id)?;
        let backend_name = self
            .session(move |s| {
                let names = s.ioctx().image_names()?;
                identity::resolve(&id, &names)
            })
            .await
            .inspect_err(|e| log_failure("Initialize connection for", volume_id, e))?;

        let (hosts, ports) = self.config.monitor_endpoints();
        let mut data = HashMap::new();
        data.insert("secret_type".to_string(), json!("ceph"));
        data.insert(
            "name".to_string(),
            json!(format!("{}/{}", self.pool, backend_name)),
        );
        data.insert("cluster_name".to_string(), json!("ceph"));
        data.insert("hosts".to_string(), json!(hosts));
        data.insert("ports".to_string(), json!(ports));
        data.insert("volume_id".to_string(), json!(volume_id));
        data.insert("access_mode".to_string(), json!("rw"));

        Ok(ConnectionInfo {
            driver_volume_type: "rbd".to_string(),
            data,
        })
    }

    async fn terminate_connection(&self, volume_id: &str) -> Result<()> {
        debug!(
            "Terminating connection: pool={}, volume={} (nothing to release)",
            self.pool, volume_id
        );
        Ok(())
    }

    async fn list_pools(&self) -> Result<Vec<StoragePoolSpec>> {
        self.inspector
            .list_pools()
            .await
            .inspect_err(|e| log_failure("List pools of", &self.pool, e))
    }

    fn driver_type(&self) -> &str {
        CEPH_DRIVER_NAME
    }
}
