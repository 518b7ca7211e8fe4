/// 存储池巡检
///
/// 组合两份管理工具报告生成存储池清单：
/// - 用量报告 `ceph df`
/// - 属性报告 `ceph osd pool ls detail`，投影为 `'<name>' <type> <p1> <p2>`
///
/// 每次调用都完整重新计算，不缓存

use common::models::StoragePoolSpec;
use common::utils::capacity::{parse_capacity_str, to_canonical_gb};
use common::{Error, Result};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::PoolConfigEntry;
use super::rbd::CommandRunner;

/// 用量报告中单个存储池的数据（字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolUsage {
    pub name: String,
    pub used: u64,
    pub max_avail: u64,
}

/// 用量报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub global_size: u64,
    pub global_avail: u64,
    pub pools: Vec<PoolUsage>,
}

/// 属性报告中单个存储池的数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolAttributes {
    pub name: String,
    pub redundancy_type: String,
    pub redundancy_size: String,
    pub crush_ruleset: String,
}

/// 由池名派生稳定的存储池 ID
pub fn pool_id(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// 解析 `ceph df` 输出
///
/// 按行位置解析：第 3 行为全局数据，第 5 行为存储池表头，之后每行一个存储池
pub fn parse_usage_report(raw: &str) -> Result<UsageReport> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 5 {
        return Err(Error::Backend(format!(
            "unexpected usage report: {} lines",
            lines.len()
        )));
    }

    let global: Vec<&str> = lines[2].split_whitespace().collect();
    let (global_size, global_avail) = match (global.first(), global.get(1)) {
        (Some(size), Some(avail)) => (parse_capacity_str(size)?, parse_capacity_str(avail)?),
        _ => {
            return Err(Error::Backend(format!(
                "unexpected global usage line: {}",
                lines[2]
            )))
        }
    };

    let header_keyword = lines[4].split_whitespace().next().unwrap_or_default();

    let mut pools = Vec::new();
    for line in &lines[5..] {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            debug!("Skipping short pool row: {}", line);
            continue;
        }
        if fields[0] == header_keyword {
            // 与重复的表头无法区分
            warn!("Dropping pool row named '{}' (same as header keyword)", fields[0]);
            continue;
        }

        let used = parse_capacity_str(fields[2]);
        let max_avail = parse_capacity_str(fields[4]);
        match (used, max_avail) {
            (Ok(used), Ok(max_avail)) => pools.push(PoolUsage {
                name: fields[0].to_string(),
                used,
                max_avail,
            }),
            _ => warn!("Skipping pool row with unreadable capacity: {}", line),
        }
    }

    Ok(UsageReport {
        global_size,
        global_avail,
        pools,
    })
}

/// 从 `ceph osd pool ls detail` 原始输出投影出属性报告行
pub fn project_attribute_report(raw: &str) -> String {
    raw.lines()
        .filter(|line| line.starts_with("pool"))
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            [2, 3, 5, 9]
                .iter()
                .filter_map(|&i| fields.get(i).copied())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 解析属性报告，类型未知或列数不足的行跳过
pub fn parse_attribute_report(raw: &str) -> Vec<PoolAttributes> {
    raw.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                if !line.trim().is_empty() {
                    debug!("Skipping short attribute row: {}", line);
                }
                return None;
            }
            match fields[1] {
                "replicated" | "erasure" => Some(PoolAttributes {
                    name: fields[0].trim_matches('\'').to_string(),
                    redundancy_type: fields[1].to_string(),
                    redundancy_size: fields[2].to_string(),
                    crush_ruleset: fields[3].to_string(),
                }),
                other => {
                    debug!("Skipping pool with unknown redundancy type: {}", other);
                    None
                }
            }
        })
        .collect()
}

/// 总容量按全局容量与可用比例估算，全局可用为 0 时退化为已用 + 可用
fn total_bytes(report: &UsageReport, usage: &PoolUsage) -> u64 {
    if report.global_avail == 0 {
        return usage.used.saturating_add(usage.max_avail);
    }
    let total = report.global_size as u128 * usage.max_avail as u128 / report.global_avail as u128;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// 按池名合并两份报告和配置，生成存储池清单
pub fn build_inventory(
    usage: &UsageReport,
    attributes: &[PoolAttributes],
    pool_config: &HashMap<String, PoolConfigEntry>,
) -> Vec<StoragePoolSpec> {
    let attrs: HashMap<&str, &PoolAttributes> =
        attributes.iter().map(|a| (a.name.as_str(), a)).collect();

    let mut pools = Vec::with_capacity(usage.pools.len());
    for row in &usage.pools {
        let Some(attr) = attrs.get(row.name.as_str()) else {
            debug!("Pool {} has no attribute row, dropped", row.name);
            continue;
        };

        let mut parameters = HashMap::new();
        parameters.insert("redundancyType".to_string(), json!(attr.redundancy_type));
        let size_key = if attr.redundancy_type == "erasure" {
            "erasureSize"
        } else {
            "replicateSize"
        };
        parameters.insert(size_key.to_string(), json!(attr.redundancy_size));
        parameters.insert("crushRuleset".to_string(), json!(attr.crush_ruleset));

        if let Some(entry) = pool_config.get(&row.name) {
            parameters.insert("diskType".to_string(), json!(entry.disk_type));
            parameters.insert("iops".to_string(), json!(entry.iops));
            parameters.insert("bandwidth".to_string(), json!(entry.band_width));
        }

        pools.push(StoragePoolSpec {
            id: pool_id(&row.name),
            name: row.name.clone(),
            total_capacity: to_canonical_gb(total_bytes(usage, row)),
            free_capacity: to_canonical_gb(row.max_avail),
            parameters,
        });
    }

    let in_usage: HashSet<&str> = usage.pools.iter().map(|p| p.name.as_str()).collect();
    for attr in attributes.iter().filter(|a| !in_usage.contains(a.name.as_str())) {
        debug!("Pool {} has no usage row, dropped", attr.name);
    }

    pools
}

/// 存储池巡检器
pub struct PoolInspector {
    conf_file: String,
    runner: Arc<dyn CommandRunner>,
    pool_config: HashMap<String, PoolConfigEntry>,
}

impl PoolInspector {
    pub fn new(
        conf_file: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
        pool_config: HashMap<String, PoolConfigEntry>,
    ) -> Self {
        Self {
            conf_file: conf_file.into(),
            runner,
            pool_config,
        }
    }

    /// 列出集群中的存储池，保持用量报告中的顺序
    pub async fn list_pools(&self) -> Result<Vec<StoragePoolSpec>> {
        let runner = self.runner.clone();
        let conf = self.conf_file.clone();

        let (usage_raw, detail_raw) = tokio::task::spawn_blocking(move || -> Result<_> {
            let usage = runner.run(
                "ceph",
                &["df".to_string(), "-c".to_string(), conf.clone()],
            )?;
            let detail = runner.run(
                "ceph",
                &[
                    "osd".to_string(),
                    "pool".to_string(),
                    "ls".to_string(),
                    "detail".to_string(),
                    "-c".to_string(),
                    conf,
                ],
            )?;
            Ok((usage, detail))
        })
        .await
        .map_err(|e| Error::Internal(format!("pool inspector worker failed: {}", e)))??;

        let usage = parse_usage_report(&usage_raw)?;
        let attributes = parse_attribute_report(&project_attribute_report(&detail_raw));
        let pools = build_inventory(&usage, &attributes, &self.pool_config);

        info!("Pool inventory refreshed: {} pools", pools.len());
        Ok(pools)
    }
}
