/// 基于 `rados` / `rbd` 命令行工具的后端实现
///
/// 所有调用都在阻塞线程中执行（见 `session::run_in_session`），
/// 查询类命令统一使用 `--format json` 输出

use common::{Error, Result};
use serde::Deserialize;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::session::{ClusterConnection, PoolContext, RadosConnector, SnapInfo};

/// 外部命令执行器
pub trait CommandRunner: Send + Sync + 'static {
    /// 执行命令并返回标准输出，退出码非零时返回 `Error::Backend`
    fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// 使用 `std::process::Command` 执行真实命令
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("Running: {} {}", program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::Backend(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("{} failed: {}", program, stderr.trim());
            return Err(Error::Backend(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    size: u64,
}

#[derive(Debug, Deserialize)]
struct SnapEntry {
    id: u64,
    name: String,
    size: u64,
}

/// 通过命令行工具访问集群
pub struct RbdCliConnector {
    conf_file: String,
    runner: Arc<dyn CommandRunner>,
}

impl RbdCliConnector {
    pub fn new(conf_file: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            conf_file: conf_file.into(),
            runner,
        }
    }
}

impl RadosConnector for RbdCliConnector {
    fn connect(&self) -> Result<Box<dyn ClusterConnection>> {
        let args = vec!["-c".to_string(), self.conf_file.clone(), "lspools".to_string()];
        let output = self
            .runner
            .run("rados", &args)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let pools = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Box::new(RbdCliConnection {
            conf_file: self.conf_file.clone(),
            runner: self.runner.clone(),
            pools,
        }))
    }
}

struct RbdCliConnection {
    conf_file: String,
    runner: Arc<dyn CommandRunner>,
    /// 连接时集群中存在的存储池
    pools: Vec<String>,
}

impl ClusterConnection for RbdCliConnection {
    fn open_pool(&mut self, pool: &str) -> Result<Box<dyn PoolContext>> {
        if !self.pools.iter().any(|p| p == pool) {
            return Err(Error::NamespaceNotFound(pool.to_string()));
        }

        Ok(Box::new(RbdCliPool {
            conf_file: self.conf_file.clone(),
            runner: self.runner.clone(),
            pool: pool.to_string(),
        }))
    }

    fn shutdown(&mut self) {
        self.pools.clear();
    }
}

struct RbdCliPool {
    conf_file: String,
    runner: Arc<dyn CommandRunner>,
    pool: String,
}

impl RbdCliPool {
    fn rbd(&self, args: &[&str]) -> Result<String> {
        let mut full = vec![
            "-c".to_string(),
            self.conf_file.clone(),
            "-p".to_string(),
            self.pool.clone(),
        ];
        full.extend(args.iter().map(|a| a.to_string()));
        self.runner.run("rbd", &full)
    }

    fn rbd_json<T: serde::de::DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--format", "json"]);
        let output = self.rbd(&full)?;
        serde_json::from_str(&output)
            .map_err(|e| Error::Backend(format!("unexpected rbd output: {}", e)))
    }
}

impl PoolContext for RbdCliPool {
    fn image_names(&self) -> Result<Vec<String>> {
        self.rbd_json(&["ls"])
    }

    fn create_image(&self, name: &str, size_bytes: u64) -> Result<()> {
        // rbd --size 默认单位为 MB
        let size_mb = (size_bytes >> 20).to_string();
        self.rbd(&["create", "--size", &size_mb, "--image", name])?;
        info!("Created rbd image {}/{} ({} MB)", self.pool, name, size_mb);
        Ok(())
    }

    fn image_size(&self, name: &str) -> Result<u64> {
        let info: ImageInfo = self.rbd_json(&["info", "--image", name])?;
        Ok(info.size)
    }

    fn remove_image(&self, name: &str) -> Result<()> {
        self.rbd(&["rm", "--image", name])?;
        info!("Removed rbd image {}/{}", self.pool, name);
        Ok(())
    }

    fn snapshots(&self, image: &str) -> Result<Vec<SnapInfo>> {
        let entries: Vec<SnapEntry> = self.rbd_json(&["snap", "ls", "--image", image])?;
        Ok(entries
            .into_iter()
            .map(|e| SnapInfo {
                id: e.id,
                name: e.name,
                size: e.size,
            })
            .collect())
    }

    fn create_snapshot(&self, image: &str, snap: &str) -> Result<()> {
        self.rbd(&["snap", "create", "--image", image, "--snap", snap])?;
        info!("Created rbd snapshot {}/{}@{}", self.pool, image, snap);
        Ok(())
    }

    fn remove_snapshot(&self, image: &str, snap: &str) -> Result<()> {
        self.rbd(&["snap", "rm", "--image", image, "--snap", snap])?;
        info!("Removed rbd snapshot {}/{}@{}", self.pool, image, snap);
        Ok(())
    }

    fn destroy(&mut self) {}
}
