//! Transceiver optical power levels.
//!
//! The command and output shape differ per dialect: NX-OS prints one
//! block per interface, IOS and IOS XE print a table. Values below
//! -40 dBm (the table's way of spelling "not available") are clamped
//! to -40.

use async_trait::async_trait;
use regex::Regex;

use super::{parse_f64, with_labels, Collector};
use crate::client::{Client, Dialect};
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

const TX_POWER_DESC: Desc = Desc::new(
    "cisco_optics_tx_power_dbm",
    "Transceiver Tx power in dBm",
    &["target", "interface"],
);
const RX_POWER_DESC: Desc = Desc::new(
    "cisco_optics_rx_power_dbm",
    "Transceiver Rx power in dBm",
    &["target", "interface"],
);

const POWER_FLOOR_DBM: f64 = -40.0;

#[derive(Debug, PartialEq)]
struct OpticsReading {
    interface: String,
    tx_power: f64,
    rx_power: f64,
}

pub struct OpticsCollector {
    block_power: Regex,
    table_row: Regex,
}

impl OpticsCollector {
    pub fn new() -> Self {
        Self {
            block_power: Regex::new(r"(Tx|Rx) Power\s*(-?[\d.]+)")
                .expect("block pattern is valid"),
            // The table carries temperature/voltage/current columns
            // before the power figures; take the last two numbers.
            table_row: Regex::new(r"^\s*(\S+)(?:\s+-?[\d.]+)*\s+(-?[\d.]+)\s+(-?[\d.]+)\s*$")
                .expect("table pattern is valid"),
        }
    }

    fn parse(&self, dialect: Dialect, output: &str) -> Vec<OpticsReading> {
        match dialect {
            Dialect::NxOs => self.parse_blocks(output),
            Dialect::Ios | Dialect::IosXe => self.parse_table(output),
        }
    }

    /// NX-OS: `show interface transceiver details` blocks separated by
    /// blank lines, each headed by the interface name.
    fn parse_blocks(&self, output: &str) -> Vec<OpticsReading> {
        let mut readings = Vec::new();
        for section in output.split("\n\n") {
            let mut lines = section.lines();
            let Some(header) = lines.next().map(str::trim) else {
                continue;
            };
            if !header.starts_with("Ethernet") {
                continue;
            }

            let mut tx_power = 0.0;
            let mut rx_power = 0.0;
            for line in lines {
                if let Some(caps) = self.block_power.captures(line) {
                    let value = parse_f64(&caps[2]);
                    match &caps[1] {
                        "Tx" => tx_power = value,
                        _ => rx_power = value,
                    }
                }
            }
            readings.push(OpticsReading {
                interface: header.to_string(),
                tx_power,
                rx_power,
            });
        }
        readings
    }

    /// IOS / IOS XE: `show interfaces transceiver` table rows. Header,
    /// separator and blank lines are skipped.
    fn parse_table(&self, output: &str) -> Vec<OpticsReading> {
        let mut readings = Vec::new();
        for line in output.lines() {
            if line.contains("Port")
                || line.contains("Interface")
                || line.contains("---")
                || line.trim().is_empty()
            {
                continue;
            }
            if let Some(caps) = self.table_row.captures(line) {
                readings.push(OpticsReading {
                    interface: caps[1].to_string(),
                    tx_power: parse_f64(&caps[2]).max(POWER_FLOOR_DBM),
                    rx_power: parse_f64(&caps[3]).max(POWER_FLOOR_DBM),
                });
            }
        }
        readings
    }
}

impl Default for OpticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for OpticsCollector {
    fn name(&self) -> &'static str {
        "optics"
    }

    fn describe(&self, descs: &mut Vec<Desc>) {
        descs.extend([TX_POWER_DESC, RX_POWER_DESC]);
    }

    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError> {
        let dialect = client.dialect().ok_or_else(|| CollectorError::Parse {
            message: "device dialect not identified".into(),
        })?;

        let command = match dialect {
            Dialect::NxOs => "show interface transceiver details",
            Dialect::Ios | Dialect::IosXe => "show interfaces transceiver",
        };
        let output = client.run_command(command).await?;

        for reading in self.parse(dialect, &output) {
            let iface_labels = with_labels(labels, &[&reading.interface]);
            sink.gauge(&TX_POWER_DESC, reading.tx_power, iface_labels.clone())
                .await?;
            sink.gauge(&RX_POWER_DESC, reading.rx_power, iface_labels)
                .await?;
        }
        Ok(())
    }
}
