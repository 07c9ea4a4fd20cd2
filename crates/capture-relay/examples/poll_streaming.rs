//! Streaming Poll Demonstration
//!
//! Opens a mock scope, binds application buffers, and polls the relay
//! until the scripted stream auto-stops.
//!
//! Run with: cargo run -p capture-relay --example poll_streaming

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use capture_core::{shared_samples, StreamingDelivery};
use capture_driver_mock::{Dispatch, MockScope, MockScopeConfig};
use capture_relay::DeviceRegistry;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Streaming Poll Demonstration ===\n");

    // 1. Open a mock scope that fires callbacks from its own thread, the
    //    way a vendor driver does.
    let scope = Arc::new(MockScope::with_config(MockScopeConfig {
        dispatch: Dispatch::Thread,
        callback_delay_ms: 5,
        ..Default::default()
    }));
    let handle = scope.open_unit();
    println!("1. Opened mock unit with handle {handle}");

    // 2. Register it and let the relay discover the channel layout from
    //    the variant string.
    let mut registry = DeviceRegistry::new(scope.clone());
    let index = registry.register(handle)?;
    registry.detect_channel_counts(index)?;
    registry.set_enabled_channels(index, &[true, false, false, false])?;
    println!("2. Registered as device index {index}");

    // 3. Bind one channel: an application buffer the caller owns and a
    //    driver buffer the mock fills.
    let capacity = 1_000;
    let app = shared_samples(capacity);
    let drv = shared_samples(capacity);
    scope.attach_driver_buffer(handle, drv.clone())?;
    registry.bind_channel(index, 0, Some(app.clone()), Some(drv), capacity)?;
    println!("3. Bound channel A with capacity {capacity}");

    // 4. Script three deliveries, the last one auto-stopping the stream.
    for (samples, start_index, auto_stop) in [(300, 0, false), (300, 300, false), (200, 600, true)]
    {
        scope.queue_delivery(
            handle,
            StreamingDelivery {
                samples,
                start_index,
                auto_stop,
                ..Default::default()
            },
        )?;
    }

    // 5. Poll until auto-stop.
    println!("4. Polling for data\n");
    let mut total = 0;
    loop {
        registry.get_streaming_latest_values(index)?;
        thread::sleep(Duration::from_millis(20));
        if let Some(available) = registry.available_data(index)? {
            total += available.samples;
            println!(
                "   {} samples at index {} (total {total})",
                available.samples, available.start_index
            );
        }
        if registry.auto_stopped(index)? {
            println!("\n5. Stream auto-stopped after {total} samples");
            break;
        }
    }

    let first = app.lock()[0];
    let last = app.lock()[799];
    println!("   app buffer spans values {first}..={last}");
    Ok(())
}
