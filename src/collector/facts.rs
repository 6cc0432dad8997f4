//! Device facts: OS version, memory pools and CPU load.

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use super::{parse_f64, with_labels, Collector, UnitCost};
use crate::client::Client;
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

const VERSION_DESC: Desc = Desc::new(
    "cisco_facts_version",
    "Running OS version (always 1; version in the label)",
    &["target", "version"],
);
const MEMORY_TOTAL_DESC: Desc = Desc::new(
    "cisco_facts_memory_total",
    "Total memory in bytes",
    &["target", "type"],
);
const MEMORY_USED_DESC: Desc = Desc::new(
    "cisco_facts_memory_used",
    "Used memory in bytes",
    &["target", "type"],
);
const MEMORY_FREE_DESC: Desc = Desc::new(
    "cisco_facts_memory_free",
    "Free memory in bytes",
    &["target", "type"],
);
const CPU_FIVE_SECONDS_DESC: Desc = Desc::new(
    "cisco_facts_cpu_five_seconds_percent",
    "CPU utilization for five seconds",
    &["target"],
);
const CPU_INTERRUPT_DESC: Desc = Desc::new(
    "cisco_facts_cpu_interrupt_percent",
    "Interrupt percentage",
    &["target"],
);
const CPU_ONE_MINUTE_DESC: Desc = Desc::new(
    "cisco_facts_cpu_one_minute_percent",
    "CPU utilization for one minute",
    &["target"],
);
const CPU_FIVE_MINUTES_DESC: Desc = Desc::new(
    "cisco_facts_cpu_five_minutes_percent",
    "CPU utilization for five minutes",
    &["target"],
);

#[derive(Debug, PartialEq)]
struct MemoryPool {
    kind: String,
    total: f64,
    used: f64,
    free: f64,
}

#[derive(Debug, Default, PartialEq)]
struct CpuLoad {
    five_seconds: f64,
    interrupts: f64,
    one_minute: f64,
    five_minutes: f64,
}

pub struct FactsCollector {
    version: Regex,
    memory: Regex,
    cpu: Regex,
}

impl FactsCollector {
    pub fn new() -> Self {
        Self {
            version: Regex::new(r"Version ([^,\s]+)").expect("version pattern is valid"),
            memory: Regex::new(r"(?im)^(Processor|I/O)\s+(\d+)\s+(\d+)\s+(\d+)")
                .expect("memory pattern is valid"),
            cpu: Regex::new(
                r"CPU utilization for five seconds: (\d+)%/(\d+)%.*?one minute: (\d+)%.*?five minutes: (\d+)%",
            )
            .expect("cpu pattern is valid"),
        }
    }

    fn parse_version(&self, output: &str) -> Option<String> {
        self.version
            .captures(output)
            .map(|caps| caps[1].to_string())
    }

    fn parse_memory(&self, output: &str) -> Vec<MemoryPool> {
        self.memory
            .captures_iter(output)
            .map(|caps| MemoryPool {
                kind: caps[1].to_string(),
                total: parse_f64(&caps[2]),
                used: parse_f64(&caps[3]),
                free: parse_f64(&caps[4]),
            })
            .collect()
    }

    fn parse_cpu(&self, output: &str) -> Option<CpuLoad> {
        self.cpu.captures(output).map(|caps| CpuLoad {
            five_seconds: parse_f64(&caps[1]),
            interrupts: parse_f64(&caps[2]),
            one_minute: parse_f64(&caps[3]),
            five_minutes: parse_f64(&caps[4]),
        })
    }
}

impl Default for FactsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for FactsCollector {
    fn name(&self) -> &'static str {
        "facts"
    }

    fn cost(&self) -> UnitCost {
        UnitCost::Light
    }

    fn describe(&self, descs: &mut Vec<Desc>) {
        descs.extend([
            VERSION_DESC,
            MEMORY_TOTAL_DESC,
            MEMORY_USED_DESC,
            MEMORY_FREE_DESC,
            CPU_FIVE_SECONDS_DESC,
            CPU_INTERRUPT_DESC,
            CPU_ONE_MINUTE_DESC,
            CPU_FIVE_MINUTES_DESC,
        ]);
    }

    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError> {
        // Transport errors abort the unit; a section that does not
        // match is skipped so the remaining facts still come through.
        let version_out = client.run_command("show version").await?;
        match self.parse_version(&version_out) {
            Some(version) => {
                sink.gauge(&VERSION_DESC, 1.0, with_labels(labels, &[&version]))
                    .await?;
            }
            None => debug!("{}: no version string in 'show version'", client.host()),
        }

        let memory_out = client.run_command("show processes memory").await?;
        let pools = self.parse_memory(&memory_out);
        if pools.is_empty() {
            debug!("{}: no memory pools in 'show processes memory'", client.host());
        }
        for pool in pools {
            let pool_labels = with_labels(labels, &[&pool.kind]);
            sink.gauge(&MEMORY_TOTAL_DESC, pool.total, pool_labels.clone())
                .await?;
            sink.gauge(&MEMORY_USED_DESC, pool.used, pool_labels.clone())
                .await?;
            sink.gauge(&MEMORY_FREE_DESC, pool.free, pool_labels).await?;
        }

        let cpu_out = client.run_command("show processes cpu").await?;
        match self.parse_cpu(&cpu_out) {
            Some(cpu) => {
                sink.gauge(&CPU_FIVE_SECONDS_DESC, cpu.five_seconds, labels.to_vec())
                    .await?;
                sink.gauge(&CPU_INTERRUPT_DESC, cpu.interrupts, labels.to_vec())
                    .await?;
                sink.gauge(&CPU_ONE_MINUTE_DESC, cpu.one_minute, labels.to_vec())
                    .await?;
                sink.gauge(&CPU_FIVE_MINUTES_DESC, cpu.five_minutes, labels.to_vec())
                    .await?;
            }
            None => debug!("{}: no CPU line in 'show processes cpu'", client.host()),
        }

        Ok(())
    }
}
