//! Temperature sensors from `show env all`.
//!
//! The output is a stateful listing: a `Switch N:` header opens a
//! section, each sensor (Inlet, Hotspot) reports a value followed by
//! its thresholds and state. The parser carries the current switch and
//! sensor across lines.

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use super::{parse_f64, with_labels, Collector, UnitCost};
use crate::client::Client;
use crate::error::CollectorError;
use crate::metrics::{Desc, MetricSink};

const TEMPERATURE_DESC: Desc = Desc::new(
    "cisco_environment_temperature_value",
    "Current temperature in degrees Celsius",
    &["target", "switch", "sensor"],
);
const YELLOW_THRESHOLD_DESC: Desc = Desc::new(
    "cisco_environment_temperature_threshold_yellow",
    "Yellow threshold temperature",
    &["target", "switch", "sensor"],
);
const RED_THRESHOLD_DESC: Desc = Desc::new(
    "cisco_environment_temperature_threshold_red",
    "Red threshold temperature",
    &["target", "switch", "sensor"],
);
const STATE_DESC: Desc = Desc::new(
    "cisco_environment_temperature_state",
    "Temperature state (1 = GREEN)",
    &["target", "switch", "sensor"],
);

#[derive(Debug, PartialEq)]
struct Reading {
    desc: &'static Desc,
    switch: String,
    sensor: String,
    value: f64,
}

pub struct EnvironmentCollector {
    switch_header: Regex,
    temperature: Regex,
    yellow: Regex,
    red: Regex,
    state: Regex,
}

impl EnvironmentCollector {
    pub fn new() -> Self {
        Self {
            switch_header: Regex::new(r"Switch (\d+): SYSTEM TEMPERATURE is (\w+)")
                .expect("switch pattern is valid"),
            temperature: Regex::new(r"(Inlet|Hotspot) Temperature Value:\s+(\d+)")
                .expect("temperature pattern is valid"),
            yellow: Regex::new(r"Yellow Threshold : (\d+)").expect("yellow pattern is valid"),
            red: Regex::new(r"Red Threshold\s+: (\d+)").expect("red pattern is valid"),
            state: Regex::new(r"Temperature State:\s+(\w+)").expect("state pattern is valid"),
        }
    }

    fn parse(&self, output: &str) -> Vec<Reading> {
        let mut readings = Vec::new();
        let mut switch = String::new();
        let mut sensor = String::new();

        for line in output.lines().map(str::trim) {
            if let Some(caps) = self.switch_header.captures(line) {
                switch = caps[1].to_string();
                continue;
            }
            if let Some(caps) = self.temperature.captures(line) {
                sensor = caps[1].to_lowercase();
                readings.push(Reading {
                    desc: &TEMPERATURE_DESC,
                    switch: switch.clone(),
                    sensor: sensor.clone(),
                    value: parse_f64(&caps[2]),
                });
                continue;
            }

            // Threshold and state lines belong to the sensor above them.
            if sensor.is_empty() {
                continue;
            }
            if let Some(caps) = self.yellow.captures(line) {
                readings.push(Reading {
                    desc: &YELLOW_THRESHOLD_DESC,
                    switch: switch.clone(),
                    sensor: sensor.clone(),
                    value: parse_f64(&caps[1]),
                });
            } else if let Some(caps) = self.red.captures(line) {
                readings.push(Reading {
                    desc: &RED_THRESHOLD_DESC,
                    switch: switch.clone(),
                    sensor: sensor.clone(),
                    value: parse_f64(&caps[1]),
                });
            } else if let Some(caps) = self.state.captures(line) {
                let state = if &caps[1] == "GREEN" { 1.0 } else { 0.0 };
                readings.push(Reading {
                    desc: &STATE_DESC,
                    switch: switch.clone(),
                    sensor: sensor.clone(),
                    value: state,
                });
            }
        }
        readings
    }
}

impl Default for EnvironmentCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for EnvironmentCollector {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn cost(&self) -> UnitCost {
        UnitCost::Light
    }

    fn describe(&self, descs: &mut Vec<Desc>) {
        descs.extend([
            TEMPERATURE_DESC,
            YELLOW_THRESHOLD_DESC,
            RED_THRESHOLD_DESC,
            STATE_DESC,
        ]);
    }

    async fn collect(
        &self,
        client: &Client,
        sink: &MetricSink,
        labels: &[String],
    ) -> Result<(), CollectorError> {
        let output = client.run_command("show env all").await?;
        let readings = self.parse(&output);
        if readings.is_empty() {
            debug!("{}: no temperature sensors in 'show env all'", client.host());
        }
        for reading in readings {
            sink.gauge(
                reading.desc,
                reading.value,
                with_labels(labels, &[&reading.switch, &reading.sensor]),
            )
            .await?;
        }
        Ok(())
    }
}
