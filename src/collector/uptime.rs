//! Uptime in seconds, read from `show version`.
//!
//! Shares the cached `show version` response with dialect
//! identification, so this unit normally costs no extra round trip.

use async_trait::async_trait;
use regex::Regex;

use super::{parse_f64, Collector, UnitCost};
use crate::client::Client;
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

const UPTIME_DESC: Desc = Desc::new(
    "cisco_uptime_seconds",
    "Device uptime in seconds",
    &["target"],
);

pub struct UptimeCollector {
    uptime: Regex,
}

impl UptimeCollector {
    pub fn new() -> Self {
        Self {
            uptime: Regex::new(r"uptime is ([\w\s,]+)").expect("uptime pattern is valid"),
        }
    }

    fn parse_uptime(&self, output: &str) -> Option<f64> {
        let caps = self.uptime.captures(output)?;
        Some(duration_phrase_seconds(&caps[1]))
    }
}

impl Default for UptimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum a "2 weeks, 3 days, 1 hour, 5 minutes" phrase into seconds.
/// Unknown units are ignored.
fn duration_phrase_seconds(phrase: &str) -> f64 {
    let mut total = 0.0;
    for part in phrase.split(", ") {
        let mut fields = part.split_whitespace();
        let (Some(count), Some(unit)) = (fields.next(), fields.next()) else {
            continue;
        };
        let count = parse_f64(count);
        if unit.starts_with("week") {
            total += count * 7.0 * 24.0 * 3600.0;
        } else if unit.starts_with("day") {
            total += count * 24.0 * 3600.0;
        } else if unit.starts_with("hour") {
            total += count * 3600.0;
        } else if unit.starts_with("minute") {
            total += count * 60.0;
        }
    }
    total
}

#[async_trait]
impl Collector for UptimeCollector {
    fn name(&self) -> &'static str {
        "uptime"
    }

    fn cost(&self) -> UnitCost {
        UnitCost::Light
    }

    fn describe(&self, descs: &mut Vec<Desc>) {
        descs.push(UPTIME_DESC);
    }

    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError> {
        let output = client.run_command("show version").await?;
        let seconds = self
            .parse_uptime(&output)
            .ok_or_else(|| CollectorError::Parse {
                message: "uptime not found in 'show version' output".into(),
            })?;
        sink.gauge(&UPTIME_DESC, seconds, labels.to_vec()).await?;
        Ok(())
    }
}
