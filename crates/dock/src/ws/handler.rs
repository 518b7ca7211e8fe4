/// RPC 请求处理器
///
/// 注册和调度 Dock 端的 RPC 方法处理器。
/// 业务失败通过 `DockResponse.error` 返回，传输层只在方法不存在或参数无法解析时报错

use common::models::VolumeAttachmentSpec;
use common::ws_rpc::types::*;
use common::ws_rpc::{RpcError, RpcErrorCode, RpcMessage};
use common::Error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::storage::StorageManager;

/// 业务错误到错误码的映射
///
/// `not_found` 为该操作对应的不存在错误码，`failed` 为兜底错误码
fn error_code(err: &Error, not_found: RpcErrorCode, failed: RpcErrorCode) -> RpcErrorCode {
    match err {
        Error::NotFound(_) => not_found,
        Error::Connection(_) => RpcErrorCode::BackendConnectionError,
        Error::NamespaceNotFound(_) => RpcErrorCode::NamespaceNotFound,
        Error::MalformedName(_) => RpcErrorCode::MalformedName,
        _ => failed,
    }
}

fn parse<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(payload).map_err(|e| RpcError::invalid_params(format!("参数错误: {}", e)))
}

/// 把驱动结果转换为 Dock 响应
fn respond<T: Serialize>(
    result: common::Result<T>,
    not_found: RpcErrorCode,
    failed: RpcErrorCode,
) -> Result<DockResponse, RpcError> {
    match result {
        Ok(value) => DockResponse::ok(&value).map_err(RpcError::serialization_error),
        Err(e) => {
            let code = error_code(&e, not_found, failed);
            Ok(DockResponse::fail(code.as_str(), e.to_string()))
        }
    }
}

/// 不返回资源对象的操作
fn respond_empty(
    result: common::Result<()>,
    not_found: RpcErrorCode,
    failed: RpcErrorCode,
) -> Result<DockResponse, RpcError> {
    match result {
        Ok(()) => Ok(DockResponse::empty()),
        Err(e) => {
            let code = error_code(&e, not_found, failed);
            Ok(DockResponse::fail(code.as_str(), e.to_string()))
        }
    }
}

/// RPC 处理器注册表
pub struct RpcHandlerRegistry {
    storage: Arc<StorageManager>,
}

impl RpcHandlerRegistry {
    /// 创建新的处理器注册表
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    /// 处理 RPC 请求
    pub async fn handle_request(&self, msg: RpcMessage) -> RpcMessage {
        let method = match &msg.method {
            Some(m) => m.clone(),
            None => {
                return RpcMessage::error_response(
                    msg.id,
                    RpcErrorCode::InvalidRequest.as_str(),
                    "缺少方法名",
                    None,
                );
            }
        };

        let payload = msg.payload.clone().unwrap_or(serde_json::Value::Null);

        debug!("处理 RPC 请求: method={}, id={}", method, msg.id);

        // 路由到对应的处理方法
        let result = match method.as_str() {
            methods::CREATE_VOLUME => self.handle_create_volume(payload).await,
            methods::PULL_VOLUME => self.handle_pull_volume(payload).await,
            methods::DELETE_VOLUME => self.handle_delete_volume(payload).await,
            methods::CREATE_ATTACHMENT => self.handle_create_attachment(payload).await,
            methods::DELETE_ATTACHMENT => self.handle_delete_attachment(payload).await,
            methods::CREATE_VOLUME_SNAPSHOT => self.handle_create_volume_snapshot(payload).await,
            methods::PULL_VOLUME_SNAPSHOT => self.handle_pull_volume_snapshot(payload).await,
            methods::DELETE_VOLUME_SNAPSHOT => self.handle_delete_volume_snapshot(payload).await,
            methods::LIST_POOLS => self.handle_list_pools(payload).await,
            _ => Err(RpcError::method_not_found(&method)),
        };

        let result = result.and_then(|resp| {
            if let Some(err) = &resp.error {
                info!("RPC {} 业务失败: [{}] {}", method, err.code, err.description);
            }
            serde_json::to_value(&resp).map_err(RpcError::serialization_error)
        });

        match result {
            Ok(value) => RpcMessage::response(msg.id, value),
            Err(e) => {
                error!("RPC 请求处理失败: method={}, error={}", method, e);
                RpcMessage::error_response(msg.id, e.code.as_str(), e.message, e.details)
            }
        }
    }

    /// 处理通知，Controller 目前不向 Dock 发送通知
    pub async fn handle_notification(
        &self,
        method: &str,
        _payload: serde_json::Value,
    ) -> Result<(), RpcError> {
        debug!("忽略通知: method={}", method);
        Ok(())
    }

    // ========================================================================
    // 存储卷
    // ========================================================================

    async fn handle_create_volume(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: CreateVolumeOpts = parse(payload)?;
        let result = self
            .storage
            .create_volume(opts.pool_name.as_deref(), &opts.name, &opts.description, opts.size)
            .await;
        respond(result, RpcErrorCode::VolumeNotFound, RpcErrorCode::VolumeCreateFailed)
    }

    async fn handle_pull_volume(&self, payload: serde_json::Value) -> Result<DockResponse, RpcError> {
        let opts: PullVolumeOpts = parse(payload)?;
        let result = self
            .storage
            .pull_volume(opts.pool_name.as_deref(), &opts.id)
            .await;
        respond(result, RpcErrorCode::VolumeNotFound, RpcErrorCode::VolumeQueryFailed)
    }

    async fn handle_delete_volume(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: DeleteVolumeOpts = parse(payload)?;
        let result = self
            .storage
            .delete_volume(opts.pool_name.as_deref(), &opts.id)
            .await;
        respond_empty(result, RpcErrorCode::VolumeNotFound, RpcErrorCode::VolumeDeleteFailed)
    }

    // ========================================================================
    // 挂载
    // ========================================================================

    async fn handle_create_attachment(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: CreateAttachmentOpts = parse(payload)?;
        let result = self
            .storage
            .initialize_connection(opts.pool_name.as_deref(), &opts.volume_id, &opts.host_info)
            .await
            .map(|connection_info| VolumeAttachmentSpec {
                id: uuid::Uuid::new_v4().to_string(),
                volume_id: opts.volume_id.clone(),
                host_info: opts.host_info.clone(),
                connection_info,
            });
        respond(
            result,
            RpcErrorCode::VolumeNotFound,
            RpcErrorCode::AttachmentCreateFailed,
        )
    }

    async fn handle_delete_attachment(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: DeleteAttachmentOpts = parse(payload)?;
        debug!("删除挂载: id={}, volume={}", opts.id, opts.volume_id);
        let result = self
            .storage
            .terminate_connection(opts.pool_name.as_deref(), &opts.volume_id)
            .await;
        respond_empty(
            result,
            RpcErrorCode::VolumeNotFound,
            RpcErrorCode::AttachmentDeleteFailed,
        )
    }

    // ========================================================================
    // 快照
    // ========================================================================

    async fn handle_create_volume_snapshot(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: CreateVolumeSnapshotOpts = parse(payload)?;
        let result = self
            .storage
            .create_snapshot(
                opts.pool_name.as_deref(),
                &opts.volume_id,
                &opts.name,
                &opts.description,
            )
            .await;
        // 父卷不存在
        respond(result, RpcErrorCode::VolumeNotFound, RpcErrorCode::SnapshotCreateFailed)
    }

    async fn handle_pull_volume_snapshot(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: PullVolumeSnapshotOpts = parse(payload)?;
        let result = self
            .storage
            .pull_snapshot(opts.pool_name.as_deref(), &opts.id)
            .await;
        respond(result, RpcErrorCode::SnapshotNotFound, RpcErrorCode::SnapshotQueryFailed)
    }

    async fn handle_delete_volume_snapshot(
        &self,
        payload: serde_json::Value,
    ) -> Result<DockResponse, RpcError> {
        let opts: DeleteVolumeSnapshotOpts = parse(payload)?;
        let result = self
            .storage
            .delete_snapshot(opts.pool_name.as_deref(), &opts.id)
            .await;
        respond_empty(
            result,
            RpcErrorCode::SnapshotNotFound,
            RpcErrorCode::SnapshotDeleteFailed,
        )
    }

    // ========================================================================
    // 存储池
    // ========================================================================

    async fn handle_list_pools(&self, payload: serde_json::Value) -> Result<DockResponse, RpcError> {
        // 允许空负载
        let _opts: ListPoolsOpts = if payload.is_null() {
            ListPoolsOpts::default()
        } else {
            parse(payload)?
        };
        let result = self.storage.list_pools().await;
        respond(result, RpcErrorCode::PoolListFailed, RpcErrorCode::PoolListFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::rbd::fake::ScriptedRunner;
    use crate::storage::session::fake::{FakeCluster, FakeConnector};
    use crate::storage::CephConfig;
    use common::models::{StoragePoolSpec, VolumeSnapshotSpec, VolumeSpec};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn registry(cluster: Arc<FakeCluster>, runner: Arc<ScriptedRunner>) -> RpcHandlerRegistry {
        let storage = StorageManager::with_connector(
            CephConfig::default(),
            Arc::new(FakeConnector(cluster)),
            runner,
            "rbd",
        );
        RpcHandlerRegistry::new(Arc::new(storage))
    }

    async fn call(registry: &RpcHandlerRegistry, method: &str, payload: serde_json::Value) -> RpcMessage {
        registry
            .handle_request(RpcMessage::request(method, payload))
            .await
    }

    fn dock_response(msg: &RpcMessage) -> DockResponse {
        assert!(msg.is_success(), "transport error: {:?}", msg.error);
        msg.parse_payload().unwrap()
    }

    #[tokio::test]
    async fn test_volume_and_snapshot_round_trip() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let reg = registry(cluster, Arc::new(ScriptedRunner::default()));

        let resp = call(&reg, methods::CREATE_VOLUME, json!({"name": "volume001", "size": 1})).await;
        let resp = dock_response(&resp);
        let vol: VolumeSpec = serde_json::from_str(&resp.result.unwrap().message).unwrap();
        assert_eq!(vol.size, 1);

        let resp = call(&reg, methods::PULL_VOLUME, json!({"id": vol.id})).await;
        let pulled: VolumeSpec =
            serde_json::from_str(&dock_response(&resp).result.unwrap().message).unwrap();
        assert_eq!(pulled.name, "volume001");

        let resp = call(
            &reg,
            methods::CREATE_VOLUME_SNAPSHOT,
            json!({"volume_id": vol.id, "name": "snapshot001"}),
        )
        .await;
        let snap: VolumeSnapshotSpec =
            serde_json::from_str(&dock_response(&resp).result.unwrap().message).unwrap();
        assert_eq!(snap.volume_id, vol.id);

        let resp = call(&reg, methods::DELETE_VOLUME_SNAPSHOT, json!({"id": snap.id})).await;
        assert!(dock_response(&resp).error.is_none());

        let resp = call(&reg, methods::DELETE_VOLUME, json!({"id": vol.id})).await;
        assert!(dock_response(&resp).error.is_none());
    }

    #[tokio::test]
    async fn test_error_code_mapping() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let reg = registry(cluster.clone(), Arc::new(ScriptedRunner::default()));
        let missing = uuid::Uuid::new_v4().to_string();

        let resp = call(&reg, methods::PULL_VOLUME, json!({"id": missing})).await;
        assert_eq!(dock_response(&resp).error.unwrap().code, "VOLUME_NOT_FOUND");

        let resp = call(&reg, methods::PULL_VOLUME_SNAPSHOT, json!({"id": missing})).await;
        assert_eq!(dock_response(&resp).error.unwrap().code, "SNAPSHOT_NOT_FOUND");

        let resp = call(
            &reg,
            methods::CREATE_VOLUME,
            json!({"name": "volume001", "size": 1, "pool_name": "nosuchpool"}),
        )
        .await;
        assert_eq!(dock_response(&resp).error.unwrap().code, "NAMESPACE_NOT_FOUND");

        let resp = call(&reg, methods::CREATE_VOLUME, json!({"name": "bad:name", "size": 1})).await;
        assert_eq!(dock_response(&resp).error.unwrap().code, "VOLUME_CREATE_FAILED");

        cluster.reachable.store(false, Ordering::SeqCst);
        let resp = call(&reg, methods::DELETE_VOLUME, json!({"id": missing})).await;
        assert_eq!(
            dock_response(&resp).error.unwrap().code,
            "BACKEND_CONNECTION_ERROR"
        );
    }

    #[tokio::test]
    async fn test_transport_errors() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let reg = registry(cluster, Arc::new(ScriptedRunner::default()));

        let resp = call(&reg, "resize_volume", json!({})).await;
        assert!(resp.is_error());
        assert_eq!(resp.error.unwrap().code, "METHOD_NOT_FOUND");

        let resp = call(&reg, methods::CREATE_VOLUME, json!({"size": "big"})).await;
        assert!(resp.is_error());
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");
    }

    #[tokio::test]
    async fn test_attachment() {
        let cluster = FakeCluster::with_pools(&["rbd"]);
        let reg = registry(cluster, Arc::new(ScriptedRunner::default()));

        let resp = call(&reg, methods::CREATE_VOLUME, json!({"name": "volume001", "size": 1})).await;
        let vol: VolumeSpec =
            serde_json::from_str(&dock_response(&resp).result.unwrap().message).unwrap();

        let resp = call(
            &reg,
            methods::CREATE_ATTACHMENT,
            json!({"volume_id": vol.id, "host_info": {"host": "node-1"}}),
        )
        .await;
        let attachment: VolumeAttachmentSpec =
            serde_json::from_str(&dock_response(&resp).result.unwrap().message).unwrap();
        assert_eq!(attachment.volume_id, vol.id);
        assert_eq!(attachment.host_info.host.as_deref(), Some("node-1"));
        assert_eq!(attachment.connection_info.driver_volume_type, "rbd");

        let resp = call(
            &reg,
            methods::DELETE_ATTACHMENT,
            json!({"id": attachment.id, "volume_id": vol.id}),
        )
        .await;
        assert!(dock_response(&resp).error.is_none());
    }

    #[tokio::test]
    async fn test_list_pools() {
        let runner = Arc::new(ScriptedRunner::default());
        runner.expect(
            "ceph df -c /etc/ceph/ceph.conf",
            "GLOBAL:\n SIZE AVAIL RAW USED %RAW USED\n 10G 5G 5G 50.00\nPOOLS:\n NAME ID USED %USED MAX AVAIL OBJECTS\n rbd 0 1G 10.00 2G 3\n",
        );
        runner.expect(
            "ceph osd pool ls detail -c /etc/ceph/ceph.conf",
            "pool 0 'rbd' replicated size 3 min_size 2 crush_rule 0 object_hash rjenkins\n",
        );
        let reg = registry(FakeCluster::with_pools(&["rbd"]), runner);

        let resp = call(&reg, methods::LIST_POOLS, json!({})).await;
        let pools: Vec<StoragePoolSpec> =
            serde_json::from_str(&dock_response(&resp).result.unwrap().message).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].total_capacity, 4);
        assert_eq!(pools[0].free_capacity, 2);
    }

    #[tokio::test]
    async fn test_list_pools_failure() {
        let reg = registry(
            FakeCluster::with_pools(&["rbd"]),
            Arc::new(ScriptedRunner::default()),
        );
        let resp = call(&reg, methods::LIST_POOLS, serde_json::Value::Null).await;
        assert_eq!(dock_response(&resp).error.unwrap().code, "POOL_LIST_FAILED");
    }
}
