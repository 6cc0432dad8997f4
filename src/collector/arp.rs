//! ARP table size.

use async_trait::async_trait;
use regex::Regex;

use super::{parse_f64, Collector, UnitCost};
use crate::client::Client;
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

const ARP_ENTRIES_DESC: Desc = Desc::new(
    "cisco_tables_arp_entries",
    "Total number of ARP entries",
    &["target"],
);

pub struct ArpCollector {
    entries: Regex,
}

impl ArpCollector {
    pub fn new() -> Self {
        Self {
            entries: Regex::new(r"Total number of entries:\s*(\d+)")
                .expect("arp pattern is valid"),
        }
    }

    fn parse_entries(&self, output: &str) -> Option<f64> {
        self.entries.captures(output).map(|caps| parse_f64(&caps[1]))
    }
}

impl Default for ArpCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for ArpCollector {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn cost(&self) -> UnitCost {
        UnitCost::Light
    }

    fn describe(&self, descs: &mut Vec<Desc>) {
        descs.push(ARP_ENTRIES_DESC);
    }

    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError> {
        let output = client.run_command("show ip arp summary").await?;
        let entries = self
            .parse_entries(&output)
            .ok_or_else(|| CollectorError::Parse {
                message: "no entry count in 'show ip arp summary' output".into(),
            })?;
        sink.gauge(&ARP_ENTRIES_DESC, entries, labels.to_vec())
            .await?;
        Ok(())
    }
}
