//! Scrape orchestration: fan out over devices, run collector units
//! under bounded concurrency and a per-device deadline.
//!
//! A scrape is pull-driven: nothing talks to a device until `collect`
//! is called, and every session opened for a scrape is closed before it
//! returns. Device failures degrade to `cisco_up 0`; they never abort
//! the other devices. A closed metric sink does: once the consumer is
//! gone every sample is lost, so the scrape stops and reports it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, trace, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::client::Client;
use crate::collector::{Collector, CollectorRegistry};
use crate::config::Config;
use crate::device::Device;
use crate::error::{CollectorError, SinkClosed, TransportError};
use crate::metrics::{Desc, MetricSink};
use crate::transport::Session;

/// Whether the device could be scraped at all.
pub const UP_DESC: Desc = Desc::new(
    "cisco_up",
    "Scrape of target was successful",
    &["target"],
);

/// Wall time of one device's whole scrape.
pub const SCRAPE_DURATION_DESC: Desc = Desc::new(
    "cisco_collector_duration_seconds",
    "Duration of a scrape for one target",
    &["target"],
);

/// Wall time of one collector unit on one device.
pub const UNIT_DURATION_DESC: Desc = Desc::new(
    "cisco_collect_duration_seconds",
    "Duration of a scrape by collector and target",
    &["target", "collector"],
);

/// Concurrency and deadline tuning for a scrape.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeOptions {
    /// Devices scraped in parallel.
    pub max_concurrent_devices: usize,

    /// Collector units running in parallel per device.
    pub max_concurrent_units: usize,

    /// Budget for one collector unit.
    pub unit_timeout: Duration,

    /// Hard deadline for one device's whole scrape. Units still queued
    /// when it passes are skipped.
    pub device_deadline: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            max_concurrent_devices: 5,
            max_concurrent_units: 2,
            unit_timeout: Duration::from_secs(30),
            device_deadline: Duration::from_secs(60),
        }
    }
}

/// Session factory, a seam for tests to substitute scripted shells.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, device: &Device) -> Result<Client, TransportError>;
}

/// The production connector: SSH sessions per device config.
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, device: &Device) -> Result<Client, TransportError> {
        Ok(Client::new(Session::connect(device).await?))
    }
}

/// Scrapes a fleet of devices into a metric sink.
pub struct Scraper {
    devices: Vec<Arc<Device>>,
    registry: Arc<CollectorRegistry>,
    connector: Arc<dyn Connector>,
    options: ScrapeOptions,
}

impl Scraper {
    /// Build a scraper for every device in the configuration, using
    /// live SSH sessions.
    pub fn new(config: &Config) -> Self {
        Self::with_connector(config, Arc::new(SshConnector))
    }

    /// Build a scraper with a custom session factory.
    pub fn with_connector(config: &Config, connector: Arc<dyn Connector>) -> Self {
        let devices = config.resolve_devices();
        let registry = CollectorRegistry::build(&devices);
        Self::from_parts(devices, registry, connector, ScrapeOptions::default())
    }

    /// Assemble a scraper from already-resolved parts.
    pub fn from_parts(
        devices: Vec<Device>,
        registry: CollectorRegistry,
        connector: Arc<dyn Connector>,
        options: ScrapeOptions,
    ) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
            registry: Arc::new(registry),
            connector,
            options,
        }
    }

    /// Replace the concurrency and deadline tuning.
    pub fn with_options(mut self, options: ScrapeOptions) -> Self {
        self.options = options;
        self
    }

    /// Every metric family this scraper can emit.
    pub fn describe(&self) -> Vec<Desc> {
        let mut descs = vec![UP_DESC, SCRAPE_DURATION_DESC, UNIT_DURATION_DESC];
        for unit in self.registry.all_units() {
            unit.describe(&mut descs);
        }
        descs
    }

    /// Scrape all devices into `sink`. Returns once every device task
    /// has finished and released its session.
    ///
    /// `SinkClosed` is the one fatal condition: the consumer dropped
    /// the receiving half, every further sample would be lost, so no
    /// more devices are dialed. Device and unit failures only degrade
    /// gauges.
    pub async fn collect(&self, sink: &MetricSink) -> Result<(), SinkClosed> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_devices));
        let mut tasks = JoinSet::new();

        for device in &self.devices {
            let device = device.clone();
            let registry = self.registry.clone();
            let connector = self.connector.clone();
            let sink = sink.clone();
            let semaphore = semaphore.clone();
            let options = self.options;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Ok(());
                };
                // No point opening a session for samples nobody reads.
                if sink.is_closed() {
                    return Err(SinkClosed);
                }
                let units = registry.units_for(&device.host).to_vec();
                scrape_device(&device, &units, connector.as_ref(), &sink, options).await
            });
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Err(e)) = joined {
                result = Err(e);
            }
        }
        result
    }
}

/// One device's scrape: connect, identify, run units, tear down.
async fn scrape_device(
    device: &Device,
    units: &[Arc<dyn Collector>],
    connector: &dyn Connector,
    sink: &MetricSink,
    options: ScrapeOptions,
) -> Result<(), SinkClosed> {
    let labels = vec![device.host.clone()];
    let started = Instant::now();
    let deadline = started + options.device_deadline;

    let mut client = match connector.connect(device).await {
        Ok(client) => client,
        Err(e) => {
            error!("{}: connect failed: {e}", device.host);
            sink.gauge(&UP_DESC, 0.0, labels.clone()).await?;
            return sink
                .gauge(&SCRAPE_DURATION_DESC, started.elapsed().as_secs_f64(), labels)
                .await;
        }
    };

    if let Err(e) = sink.gauge(&UP_DESC, 1.0, labels.clone()).await {
        client.close().await;
        return Err(e);
    }

    if let Err(e) = client.identify().await {
        error!("{}: {e}", device.host);
        client.close().await;
        return sink
            .gauge(&SCRAPE_DURATION_DESC, started.elapsed().as_secs_f64(), labels)
            .await;
    }

    let client = Arc::new(client);
    let result = run_units(client.clone(), units, sink, &labels, deadline, options).await;

    // The session is released whatever the units did; all workers are
    // done, so this is the last handle.
    if let Ok(client) = Arc::try_unwrap(client) {
        client.close().await;
    }
    result?;
    sink.gauge(&SCRAPE_DURATION_DESC, started.elapsed().as_secs_f64(), labels)
        .await
}

/// Run the device's units with a pool of `max_concurrent_units`
/// workers draining the ordered list, so the light band is always
/// dequeued before the heavy one.
async fn run_units(
    client: Arc<Client>,
    units: &[Arc<dyn Collector>],
    sink: &MetricSink,
    labels: &[String],
    deadline: Instant,
    options: ScrapeOptions,
) -> Result<(), SinkClosed> {
    let units: Arc<[Arc<dyn Collector>]> = Arc::from(units.to_vec());
    let next = Arc::new(AtomicUsize::new(0));
    let mut workers = JoinSet::new();

    for _ in 0..options.max_concurrent_units.max(1) {
        let units = units.clone();
        let next = next.clone();
        let client = client.clone();
        let sink = sink.clone();
        let labels = labels.to_vec();

        workers.spawn(async move {
            while let Some(unit) = units.get(next.fetch_add(1, Ordering::SeqCst)) {
                run_unit(unit.as_ref(), &client, &sink, &labels, deadline, options).await?;
            }
            Ok(())
        });
    }

    let mut result = Ok(());
    while let Some(joined) = workers.join_next().await {
        if let Ok(Err(e)) = joined {
            result = Err(e);
        }
    }
    result
}

/// One unit on one device, within the smaller of the unit timeout and
/// what remains of the device deadline. Every started unit reports a
/// duration sample, timeouts and failures included.
async fn run_unit(
    unit: &dyn Collector,
    client: &Client,
    sink: &MetricSink,
    labels: &[String],
    deadline: Instant,
    options: ScrapeOptions,
) -> Result<(), SinkClosed> {
    let now = Instant::now();
    if now >= deadline {
        warn!(
            "{}: skipping {}, device deadline passed",
            labels[0],
            unit.name()
        );
        return Ok(());
    }
    let budget = options.unit_timeout.min(deadline - now);

    let started = Instant::now();
    match tokio::time::timeout(budget, unit.collect(client, sink, labels)).await {
        Ok(Ok(())) => trace!("{}: {} ok", labels[0], unit.name()),
        Ok(Err(CollectorError::Sink(e))) => return Err(e),
        Ok(Err(e)) if e.is_benign_disconnect() => {
            debug!("{}: {}: {e}", labels[0], unit.name());
        }
        Ok(Err(e)) => error!("{}: {} failed: {e}", labels[0], unit.name()),
        Err(_) => warn!(
            "{}: {} timed out after {budget:?}",
            labels[0],
            unit.name()
        ),
    }

    let mut unit_labels = labels.to_vec();
    unit_labels.push(unit.name().to_string());
    sink.gauge(&UNIT_DURATION_DESC, started.elapsed().as_secs_f64(), unit_labels)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::collector::UnitCost;
    use crate::config::FeatureSet;
    use crate::device::AuthMethod;
    use crate::error::CollectorError;
    use crate::metrics::Sample;
    use crate::transport::testing::ScriptedShell;

    const VERSION_IOSXE: &str = "Cisco IOS XE Software, Version 17.09.04a";

    fn device(host: &str) -> Device {
        Device {
            host: host.to_string(),
            port: 22,
            username: "monitor".into(),
            auth: AuthMethod::None,
            command_timeout: Duration::from_secs(5),
            batch_size: 10_000,
            legacy_ciphers: false,
            host_key_verification: Default::default(),
            features: FeatureSet {
                facts: true,
                uptime: true,
                arp: true,
                environment: true,
                optics: true,
            },
        }
    }

    /// Connector backed by scripted shells; tracks peak concurrency.
    struct FakeConnector {
        current: AtomicUsize,
        peak: AtomicUsize,
        fail: bool,
    }

    impl FakeConnector {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, device: &Device) -> Result<Client, TransportError> {
            if self.fail {
                return Err(TransportError::ConnectionFailed {
                    host: device.host.clone(),
                    port: device.port,
                    reason: "refused".into(),
                });
            }
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            let shell = ScriptedShell::with_outputs(&[("show version", VERSION_IOSXE)]);
            Ok(Client::new(shell.into_session().await))
        }
    }

    /// Unit with a scripted outcome; tracks peak concurrency and the
    /// order units started in.
    struct TestUnit {
        name: &'static str,
        delay: Duration,
        fails: bool,
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl TestUnit {
        fn ok(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                delay,
                fails: false,
                current: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                order: Arc::new(std::sync::Mutex::new(Vec::new())),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                delay: Duration::ZERO,
                fails: true,
                current: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                order: Arc::new(std::sync::Mutex::new(Vec::new())),
            })
        }

        /// A unit sharing another unit's counters and order log.
        fn sharing(name: &'static str, delay: Duration, other: &Self) -> Arc<Self> {
            Arc::new(Self {
                name,
                delay,
                fails: false,
                current: other.current.clone(),
                peak: other.peak.clone(),
                order: other.order.clone(),
            })
        }
    }

    #[async_trait]
    impl Collector for TestUnit {
        fn name(&self) -> &'static str {
            self.name
        }

        fn cost(&self) -> UnitCost {
            UnitCost::Light
        }

        fn describe(&self, _descs: &mut Vec<Desc>) {}

        async fn collect(
            &self,
            _client: &Client,
            _sink: &MetricSink,
            _labels: &[String],
        ) -> Result<(), CollectorError> {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.name);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);
            if self.fails {
                Err(CollectorError::Parse {
                    message: "bad output".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn samples_named<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
        samples.iter().filter(|s| s.name == name).collect()
    }

    async fn run_scrape(scraper: &Scraper) -> Vec<Sample> {
        let (sink, mut rx) = MetricSink::channel(1024);
        scraper.collect(&sink).await.unwrap();
        drop(sink);
        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        samples
    }

    #[tokio::test(start_paused = true)]
    async fn every_device_reports_up_exactly_once() {
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", vec![TestUnit::ok("facts", Duration::ZERO)]),
            Arc::new(FakeConnector::new()),
            ScrapeOptions::default(),
        );

        let samples = run_scrape(&scraper).await;
        let up = samples_named(&samples, "cisco_up");
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].value, 1.0);
        assert_eq!(up[0].labels, vec!["sw1".to_string()]);

        assert_eq!(samples_named(&samples, "cisco_collector_duration_seconds").len(), 1);
        assert_eq!(samples_named(&samples, "cisco_collect_duration_seconds").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_failure_reports_down_without_units() {
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", vec![TestUnit::ok("facts", Duration::ZERO)]),
            Arc::new(FakeConnector::failing()),
            ScrapeOptions::default(),
        );

        let samples = run_scrape(&scraper).await;
        let up = samples_named(&samples, "cisco_up");
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].value, 0.0);

        assert_eq!(samples_named(&samples, "cisco_collector_duration_seconds").len(), 1);
        assert!(samples_named(&samples, "cisco_collect_duration_seconds").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_unit_does_not_stop_the_others() {
        let units: Vec<Arc<dyn Collector>> = vec![
            TestUnit::ok("facts", Duration::ZERO),
            TestUnit::failing("arp"),
            TestUnit::ok("uptime", Duration::ZERO),
        ];
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", units),
            Arc::new(FakeConnector::new()),
            ScrapeOptions::default(),
        );

        let samples = run_scrape(&scraper).await;
        // Every unit, failed included, reports a duration.
        let durations = samples_named(&samples, "cisco_collect_duration_seconds");
        assert_eq!(durations.len(), 3);
        assert_eq!(samples_named(&samples, "cisco_up")[0].value, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unit_concurrency_is_bounded() {
        let first = TestUnit::ok("facts", Duration::from_secs(1));
        let peak = first.peak.clone();
        let units: Vec<Arc<dyn Collector>> = vec![
            TestUnit::sharing("uptime", Duration::from_secs(1), &first),
            TestUnit::sharing("arp", Duration::from_secs(1), &first),
            TestUnit::sharing("environment", Duration::from_secs(1), &first),
            first,
        ];
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", units),
            Arc::new(FakeConnector::new()),
            ScrapeOptions::default(),
        );

        run_scrape(&scraper).await;
        assert!(peak.load(Ordering::SeqCst) <= 2, "more than two units ran at once");
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_skips_queued_units() {
        // One unit at a time, 2s each, 3s deadline: the first runs
        // fully, the second is cut short, the third never starts.
        let units: Vec<Arc<dyn Collector>> = vec![
            TestUnit::ok("facts", Duration::from_secs(2)),
            TestUnit::ok("uptime", Duration::from_secs(2)),
            TestUnit::ok("arp", Duration::from_secs(2)),
        ];
        let options = ScrapeOptions {
            max_concurrent_units: 1,
            device_deadline: Duration::from_secs(3),
            ..ScrapeOptions::default()
        };
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", units),
            Arc::new(FakeConnector::new()),
            options,
        );

        let samples = run_scrape(&scraper).await;
        let durations = samples_named(&samples, "cisco_collect_duration_seconds");
        assert_eq!(durations.len(), 2, "the skipped unit reports no duration");
    }

    #[tokio::test(start_paused = true)]
    async fn units_start_in_registry_order() {
        // One worker makes the drain order observable: it must match
        // the unit list exactly, which is how the light band is
        // guaranteed to start before the heavy one.
        let facts = TestUnit::ok("facts", Duration::from_millis(10));
        let order = facts.order.clone();
        let units: Vec<Arc<dyn Collector>> = vec![
            facts.clone(),
            TestUnit::sharing("uptime", Duration::from_millis(10), &facts),
            TestUnit::sharing("arp", Duration::from_millis(10), &facts),
            TestUnit::sharing("optics", Duration::from_millis(10), &facts),
        ];
        let options = ScrapeOptions {
            max_concurrent_units: 1,
            ..ScrapeOptions::default()
        };
        let scraper = Scraper::from_parts(
            vec![device("sw1")],
            CollectorRegistry::from_units("sw1", units),
            Arc::new(FakeConnector::new()),
            options,
        );

        run_scrape(&scraper).await;
        assert_eq!(
            order.lock().unwrap().as_slice(),
            ["facts", "uptime", "arp", "optics"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn closed_sink_fails_the_scrape() {
        let connector = Arc::new(FakeConnector::new());
        let scraper = Scraper::from_parts(
            vec![device("sw1"), device("sw2")],
            CollectorRegistry::from_units("sw1", vec![TestUnit::ok("facts", Duration::ZERO)]),
            connector.clone(),
            ScrapeOptions::default(),
        );

        let (sink, rx) = MetricSink::channel(16);
        drop(rx);
        assert_eq!(scraper.collect(&sink).await, Err(SinkClosed));
        assert_eq!(
            connector.peak.load(Ordering::SeqCst),
            0,
            "no session is opened once the consumer is gone"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn device_concurrency_is_bounded() {
        // Eight devices, a five-session cap. The peak is measured at
        // connect time, which runs under the device permit. Hosts
        // beyond sw1 simply have no units; connect and identify still
        // happen.
        let connector = Arc::new(FakeConnector::new());
        let devices: Vec<Device> = (1..=8).map(|i| device(&format!("sw{i}"))).collect();
        let registry =
            CollectorRegistry::from_units("sw1", vec![TestUnit::ok("facts", Duration::ZERO)]);

        let scraper = Scraper::from_parts(
            devices,
            registry,
            connector.clone(),
            ScrapeOptions::default(),
        );

        let samples = run_scrape(&scraper).await;
        assert_eq!(samples_named(&samples, "cisco_up").len(), 8);
        assert!(connector.peak.load(Ordering::SeqCst) <= 5);
        assert!(connector.peak.load(Ordering::SeqCst) >= 1);
    }
}
