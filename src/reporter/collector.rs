//! # Push Collector Reporter
//!
//! Sends metrics to a Graphite-compatible collector using the plaintext
//! protocol over UDP: one `path value timestamp` line per value.

use super::{datums, Reporter, ReporterSettings, METRIC_PREFIX};
use crate::error::MonitoringError;
use crate::metrics::RegistrySnapshot;
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};
use tokio::net::UdpSocket;
use tracing::debug;

/// Largest datagram payload sent, safely below common path MTUs.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

/// # Collector Reporter
#[derive(Debug, Clone)]
pub struct CollectorReporter {
    target: SocketAddr,
    prefix: String,
}

impl CollectorReporter {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            prefix: METRIC_PREFIX.to_string(),
        }
    }

    /// Build from settings when a collector address is configured.
    /// Resolution failures are errors so the next backend gets a chance.
    pub fn from_settings(settings: &ReporterSettings) -> Result<Option<Self>, MonitoringError> {
        let address = match settings.collector_address.as_deref() {
            Some(address) if !address.trim().is_empty() => address.trim(),
            _ => return Ok(None),
        };

        let target = address
            .to_socket_addrs()
            .map_err(|e| MonitoringError::Reporter(format!("Cannot resolve collector '{}': {}", address, e)))?
            .next()
            .ok_or_else(|| MonitoringError::Reporter(format!("Collector '{}' has no address", address)))?;

        Ok(Some(Self::new(target)))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Plaintext lines for every finite value in the snapshot.
    pub fn render_lines(&self, snapshot: &RegistrySnapshot) -> Vec<String> {
        let timestamp = snapshot.timestamp / 1000;
        datums(snapshot)
            .into_iter()
            .map(|datum| {
                format!(
                    "{}.{}.{} {} {}\n",
                    self.prefix,
                    sanitize(&datum.metric),
                    datum.field,
                    datum.value,
                    timestamp
                )
            })
            .collect()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Pack whole lines into payloads of at most `limit` bytes. A single line
/// longer than `limit` travels alone.
pub fn pack_datagrams(lines: &[String], limit: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + line.len() > limit {
            datagrams.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        datagrams.push(current);
    }
    datagrams
}

#[async_trait]
impl Reporter for CollectorReporter {
    fn name(&self) -> &'static str {
        "collector"
    }

    async fn report(&self, snapshot: &RegistrySnapshot) -> Result<(), MonitoringError> {
        let lines = self.render_lines(snapshot);
        if lines.is_empty() {
            return Ok(());
        }

        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;

        let datagrams = pack_datagrams(&lines, MAX_DATAGRAM_BYTES);
        for datagram in &datagrams {
            socket.send_to(datagram.as_bytes(), self.target).await?;
        }
        debug!(
            target_addr = %self.target,
            lines = lines.len(),
            datagrams = datagrams.len(),
            "Pushed metrics to collector"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Gauge, ManualClock, MetricStore};
    use std::sync::Arc;

    #[test]
    fn test_missing_address_is_not_configured() {
        let settings = ReporterSettings::default();
        assert!(CollectorReporter::from_settings(&settings).unwrap().is_none());

        let settings = ReporterSettings {
            collector_address: Some("  ".to_string()),
            ..ReporterSettings::default()
        };
        assert!(CollectorReporter::from_settings(&settings).unwrap().is_none());
    }

    #[test]
    fn test_unresolvable_address_is_an_error() {
        let settings = ReporterSettings {
            collector_address: Some("no-port-here".to_string()),
            ..ReporterSettings::default()
        };
        assert!(CollectorReporter::from_settings(&settings).is_err());
    }

    #[test]
    fn test_lines_are_prefixed_and_timestamped_in_seconds() {
        let clock = Arc::new(ManualClock::new());
        clock.set_secs(42);
        let store = MetricStore::with_clock(clock);
        store.register_gauge("memory.used", Gauge::new(|| 1024.0)).unwrap();

        let reporter = CollectorReporter::new("127.0.0.1:2003".parse().unwrap());
        let lines = reporter.render_lines(&store.snapshot());
        assert_eq!(lines, vec!["webauthor.memory.used.value 1024 42\n".to_string()]);
    }

    #[test]
    fn test_datagrams_respect_size_limit() {
        let lines: Vec<String> = (0..100).map(|i| format!("webauthor.metric.{} {} 1\n", i, i)).collect();
        let datagrams = pack_datagrams(&lines, 200);
        assert!(datagrams.len() > 1);
        assert!(datagrams.iter().all(|d| d.len() <= 200));
        assert_eq!(datagrams.concat(), lines.concat());
    }

    #[test]
    fn test_oversized_line_travels_alone() {
        let lines = vec!["x".repeat(50), "y".repeat(10)];
        let datagrams = pack_datagrams(&lines, 20);
        assert_eq!(datagrams, vec!["x".repeat(50), "y".repeat(10)]);
    }
}
