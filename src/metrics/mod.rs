//! # Metrics Module
//!
//! In-process metric primitives: rate meters, latency timers backed by a
//! time-decayed reservoir, computed gauges, and the registry that owns them.

pub mod clock;
pub mod ewma;
pub mod gauge;
pub mod meter;
pub mod reservoir;
pub mod store;
pub mod system;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gauge::{Gauge, Ratio, RatioGauge};
pub use meter::RateMeter;
pub use reservoir::{ExponentiallyDecayingReservoir, WeightedSnapshot};
pub use store::{MeterValue, Metric, MetricStore, MetricValue, RegistrySnapshot, TimerValue};
pub use system::register_memory_gauges;
pub use timer::{LatencyTimer, TimerContext};
