//! Scriptable mock acquisition driver.
//!
//! [`MockScope`] implements [`capture_core::ScopeDriver`] without hardware:
//! tests open units, attach driver-owned buffers, queue delivery
//! descriptors, and the mock replays them when the relay asks for the
//! latest values — filling its buffers first, exactly like the vendor
//! driver fills its ring buffer before invoking the streaming callback.
//!
//! Two dispatch modes cover both halves of the callback contract:
//!
//! - [`Dispatch::Inline`] invokes handlers synchronously on the requesting
//!   thread (the real driver does this inside its latest-values call) —
//!   deterministic, good for most tests.
//! - [`Dispatch::Thread`] invokes handlers from a spawned thread after an
//!   optional delay, for exercising the concurrent poll path.
//!
//! # Example
//!
//! ```rust,ignore
//! let scope = MockScope::new();
//! let handle = scope.open_unit();
//! let drv_buf = shared_samples(1000);
//! scope.attach_driver_buffer(handle, drv_buf.clone())?;
//! scope.queue_delivery(handle, StreamingDelivery { samples: 500, ..Default::default() });
//! ```

mod waveform;

pub use waveform::FillPattern;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use capture_core::{
    BlockHandler, BlockRequest, DeviceHandle, DriverError, DriverErrorKind, ScopeDriver,
    SharedSamples, StreamingDelivery, StreamingHandler, UnitInfo,
};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::debug;

const DRIVER_NAME: &str = "mock_scope";

/// How the mock invokes callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// Synchronously, on the thread that made the request.
    #[default]
    Inline,
    /// From a spawned thread, after `callback_delay_ms`.
    Thread,
}

/// Mock driver configuration, decodable from a TOML table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MockScopeConfig {
    /// Variant string reported by `unit_info`, e.g. `"2405A"` or
    /// `"2205AMSO"`.
    pub variant: String,
    /// Seed for noise generation; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Callback dispatch mode.
    pub dispatch: Dispatch,
    /// Delay before a threaded callback fires.
    pub callback_delay_ms: u64,
    /// Pattern written into attached driver buffers per delivery.
    pub fill: FillPattern,
}

impl Default for MockScopeConfig {
    fn default() -> Self {
        Self {
            variant: "2405A".into(),
            seed: Some(0),
            dispatch: Dispatch::Inline,
            callback_delay_ms: 0,
            fill: FillPattern::Ramp,
        }
    }
}

struct MockUnit {
    variant: String,
    /// Driver-owned buffers the mock fills before each delivery.
    buffers: Vec<SharedSamples>,
    /// Scripted streaming deliveries, replayed one per latest-values call.
    script: VecDeque<StreamingDelivery>,
}

struct Inner {
    next_handle: DeviceHandle,
    units: HashMap<DeviceHandle, MockUnit>,
    rng: ChaCha8Rng,
}

/// A driver made of queues: no hardware, fully scriptable.
pub struct MockScope {
    config: MockScopeConfig,
    inner: Mutex<Inner>,
}

impl Default for MockScope {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScope {
    pub fn new() -> Self {
        Self::with_config(MockScopeConfig::default())
    }

    pub fn with_config(config: MockScopeConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            inner: Mutex::new(Inner {
                next_handle: 1,
                units: HashMap::new(),
                rng,
            }),
        }
    }

    /// Build from a TOML table, the same way driver factories decode their
    /// config sections.
    pub fn from_toml(config: toml::Value) -> anyhow::Result<Self> {
        let config: MockScopeConfig = config.try_into()?;
        Ok(Self::with_config(config))
    }

    /// Open a unit and return its handle. Handles are positive and unique
    /// for the life of the mock.
    pub fn open_unit(&self) -> DeviceHandle {
        let mut inner = self.inner.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.units.insert(
            handle,
            MockUnit {
                variant: self.config.variant.clone(),
                buffers: Vec::new(),
                script: VecDeque::new(),
            },
        );
        debug!(handle, "mock unit opened");
        handle
    }

    /// Close a unit. Queued deliveries are dropped.
    pub fn close_unit(&self, handle: DeviceHandle) {
        self.inner.lock().units.remove(&handle);
        debug!(handle, "mock unit closed");
    }

    /// Register a driver-owned buffer the mock will fill on each delivery.
    pub fn attach_driver_buffer(
        &self,
        handle: DeviceHandle,
        buffer: SharedSamples,
    ) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        let unit = Self::unit(&mut inner, handle)?;
        unit.buffers.push(buffer);
        Ok(())
    }

    /// Queue a streaming delivery; replayed by the next latest-values call.
    pub fn queue_delivery(
        &self,
        handle: DeviceHandle,
        delivery: StreamingDelivery,
    ) -> Result<(), DriverError> {
        let mut inner = self.inner.lock();
        let unit = Self::unit(&mut inner, handle)?;
        unit.script.push_back(delivery);
        Ok(())
    }

    /// Deliveries still queued for a unit.
    pub fn pending_deliveries(&self, handle: DeviceHandle) -> usize {
        self.inner
            .lock()
            .units
            .get(&handle)
            .map_or(0, |u| u.script.len())
    }

    fn unit(inner: &mut Inner, handle: DeviceHandle) -> Result<&mut MockUnit, DriverError> {
        inner.units.get_mut(&handle).ok_or_else(|| {
            DriverError::new(
                DRIVER_NAME,
                DriverErrorKind::InvalidHandle,
                format!("no open unit with handle {handle}"),
            )
        })
    }

    fn dispatch<F: FnOnce() + Send + 'static>(&self, invoke: F) {
        match self.config.dispatch {
            Dispatch::Inline => invoke(),
            Dispatch::Thread => {
                let delay = Duration::from_millis(self.config.callback_delay_ms);
                std::thread::spawn(move || {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    invoke();
                });
            }
        }
    }
}

impl ScopeDriver for MockScope {
    fn run_block(
        &self,
        handle: DeviceHandle,
        request: &BlockRequest,
        handler: Arc<dyn BlockHandler>,
    ) -> Result<(), DriverError> {
        {
            let mut inner = self.inner.lock();
            Self::unit(&mut inner, handle)?;
        }
        debug!(handle, total = request.total_samples(), "mock block capture");
        self.dispatch(move || handler.block_ready());
        Ok(())
    }

    fn request_latest_values(
        &self,
        handle: DeviceHandle,
        handler: Arc<dyn StreamingHandler>,
    ) -> Result<(), DriverError> {
        let delivery = {
            let mut inner = self.inner.lock();
            let fill = self.config.fill;
            let unit = Self::unit(&mut inner, handle)?;
            let Some(delivery) = unit.script.pop_front() else {
                // Nothing new: the driver is allowed to invoke the
                // callback zero times for a request.
                return Ok(());
            };
            if delivery.samples > 0 {
                let buffers = unit.buffers.clone();
                let rng = &mut inner.rng;
                for buffer in buffers {
                    let mut samples = buffer.lock();
                    let start = delivery.start_index.min(samples.len());
                    let end = (delivery.start_index + delivery.samples).min(samples.len());
                    waveform::fill(&mut samples[start..end], start, fill, rng);
                }
            }
            delivery
        };
        self.dispatch(move || handler.deliver(&delivery));
        Ok(())
    }

    fn unit_info(&self, handle: DeviceHandle) -> Result<UnitInfo, DriverError> {
        let mut inner = self.inner.lock();
        let unit = Self::unit(&mut inner, handle)?;
        Ok(UnitInfo {
            variant: unit.variant.clone(),
        })
    }
}
