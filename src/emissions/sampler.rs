// src/emissions/sampler.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Source of the instance's current CPU utilization, in percent (0–100).
#[async_trait]
pub trait UtilizationSampler: Send + Sync {
    async fn sample(&self) -> Result<f64>;
}

/// Always reports the same utilization. Used in tests and demos.
#[derive(Debug, Clone, Copy)]
pub struct FixedUtilization(pub f64);

#[async_trait]
impl UtilizationSampler for FixedUtilization {
    async fn sample(&self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Linux `/proc/stat` sampler: two reads `interval` apart, busy share of the
/// aggregate `cpu` line in between.
#[derive(Debug, Clone)]
pub struct ProcStatSampler {
    path: PathBuf,
    interval: Duration,
}

impl Default for ProcStatSampler {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/stat"),
            interval: Duration::from_millis(500),
        }
    }
}

impl ProcStatSampler {
    pub fn with_path(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    async fn read_times(&self) -> Result<CpuTimes> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        parse_cpu_line(&raw)
    }
}

#[async_trait]
impl UtilizationSampler for ProcStatSampler {
    async fn sample(&self) -> Result<f64> {
        let a = self.read_times().await?;
        tokio::time::sleep(self.interval).await;
        let b = self.read_times().await?;
        utilization_between(a, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    total: u64,
    idle: u64,
}

/// Parse the aggregate `cpu ` line. Idle time includes iowait.
fn parse_cpu_line(stat: &str) -> Result<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| anyhow!("no aggregate cpu line"))?;
    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .context("parsing cpu counters")?;
    if fields.len() < 4 {
        return Err(anyhow!("cpu line has {} fields, need at least 4", fields.len()));
    }
    // user nice system idle iowait irq softirq steal (guest* already in user/nice)
    let total = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes { total, idle })
}

fn utilization_between(a: CpuTimes, b: CpuTimes) -> Result<f64> {
    let d_total = b.total.saturating_sub(a.total);
    let d_idle = b.idle.saturating_sub(a.idle);
    if d_total == 0 {
        return Err(anyhow!("no cpu ticks elapsed between samples"));
    }
    let busy = d_total.saturating_sub(d_idle) as f64;
    Ok((busy / d_total as f64 * 100.0).clamp(0.0, 100.0))
}
