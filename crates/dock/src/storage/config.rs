/// Ceph 驱动配置
///
/// 从 YAML 文件加载，例如：
///
/// ```yaml
/// configFile: /etc/ceph/ceph.conf
/// pool:
///   rbd:
///     diskType: SSD
///     iops: 1000
///     bandWidth: 1000
/// monitors:
///   - 192.168.0.10:6789
/// ```

use common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// 默认驱动配置文件路径
pub const DEFAULT_DRIVER_CONFIG: &str = "/etc/easysds/driver/ceph.yaml";

/// 默认集群配置文件路径
pub const DEFAULT_CEPH_CONF: &str = "/etc/ceph/ceph.conf";

/// 单个存储池的附加属性
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PoolConfigEntry {
    #[serde(rename = "diskType", default)]
    pub disk_type: String,
    #[serde(default)]
    pub iops: i64,
    #[serde(rename = "bandWidth", default)]
    pub band_width: i64,
}

/// Ceph 驱动配置
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CephConfig {
    #[serde(rename = "configFile", default = "default_conf_file")]
    pub config_file: String,
    #[serde(default)]
    pub pool: HashMap<String, PoolConfigEntry>,
    /// 监视器地址，格式为 host:port
    #[serde(default)]
    pub monitors: Vec<String>,
}

fn default_conf_file() -> String {
    DEFAULT_CEPH_CONF.to_string()
}

impl Default for CephConfig {
    fn default() -> Self {
        Self {
            config_file: default_conf_file(),
            pool: HashMap::new(),
            monitors: Vec::new(),
        }
    }
}

impl CephConfig {
    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Driver config {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {:?}: {}", path, e)))?;

        // 池名区分大小写，键名必须原样保留
        let cfg = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str::<CephConfig>(&content)
                .map_err(|e| Error::Config(format!("Invalid driver config {:?}: {}", path, e)))?
        };

        info!(
            "Loaded driver config {:?}: conf={}, pools={}, monitors={}",
            path,
            cfg.config_file,
            cfg.pool.len(),
            cfg.monitors.len()
        );
        Ok(cfg)
    }

    /// 监视器主机和端口列表
    pub fn monitor_endpoints(&self) -> (Vec<String>, Vec<String>) {
        self.monitors
            .iter()
            .map(|m| match m.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), port.to_string()),
                None => (m.clone(), "6789".to_string()),
            })
            .unzip()
    }
}
