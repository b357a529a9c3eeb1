// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic interval-cache usage example.
//!
//! Demonstrates:
//! 1. Building a cache around a flaky delivery function
//! 2. Admission: duplicates and near-duplicates are rejected
//! 3. Background polling retrying until delivery succeeds
//! 4. Items that never succeed expiring after the attempt ceiling
//! 5. The timer stopping itself once the cache drains
//! 6. Displaying captured metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use parking_lot::Mutex;

use interval_cache::{CacheItem, FlushError, IntervalCache, PollState};

/// A notification waiting to be pushed to a device.
#[derive(Debug)]
struct Push {
    id: u32,
    device: String,
    text: String,
}

impl CacheItem for Push {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }

    // Same text queued twice for the same device
    fn is_close_to(&self, other: &Self) -> bool {
        self.device == other.device && self.text == other.text
    }
}

fn push(id: u32, device: &str, text: &str) -> Push {
    Push {
        id,
        device: device.to_string(),
        text: text.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           interval-cache: Basic Usage Example                 ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. A delivery function that needs a few tries per device
    // ─────────────────────────────────────────────────────────────────────────
    // "tablet" succeeds on the 2nd try, "phone" on the 3rd, "watch" never.
    let tries: Arc<Mutex<HashMap<u32, u32>>> = Arc::new(Mutex::new(HashMap::new()));
    let counter = tries.clone();

    let cache = IntervalCache::<Push>::builder()
        .name("push")
        .flush_interval(Duration::from_millis(200))
        .item_expiration_attempts(4)
        .flush_with(move |entry| {
            let push = entry.item();
            let mut tries = counter.lock();
            let attempt = tries.entry(push.id).or_insert(0);
            *attempt += 1;

            match push.device.as_str() {
                "tablet" => Ok(*attempt >= 2),
                "phone" => Ok(*attempt >= 3),
                _ => Err(FlushError::failed("device unreachable")),
            }
        })
        .build()?;

    println!("📦 Cache '{}' built, state: {}", cache.name(), cache.poll_state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Admission
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Admitting notifications...");
    let candidates = [
        push(1, "phone", "Your order shipped"),
        push(2, "tablet", "Your order shipped"),
        push(1, "watch", "Duplicate id"),
        push(3, "phone", "Your order shipped"),
        push(4, "watch", "Battery low"),
    ];
    for candidate in candidates {
        let label = format!("#{} → {} \"{}\"", candidate.id, candidate.device, candidate.text);
        let admitted = cache.add(candidate);
        println!("   └─ {}: {}", label, if admitted { "admitted" } else { "rejected" });
    }
    println!("   Cached: {}, state: {}", cache.get_count(), cache.poll_state());

    // ─────────────────────────────────────────────────────────────────────────
    // 3-5. Let the timer work until the cache drains
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⏳ Polling...");
    let mut last_count = cache.get_count();
    while cache.poll_state() == PollState::Running {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let count = cache.get_count();
        if count != last_count {
            println!("   └─ {} item(s) remaining", count);
            last_count = count;
        }
    }
    println!("   ✅ Drained. State: {}", cache.poll_state());

    println!("\n🔁 Attempts per notification:");
    let mut attempts: Vec<_> = tries.lock().iter().map(|(id, n)| (*id, *n)).collect();
    attempts.sort_unstable();
    for (id, n) in attempts {
        println!("   └─ #{}: {}", id, n);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Captured metrics:");
    dump_metrics(&snapshotter);

    cache.dispose();
    println!("\n🛑 Disposed. State: {}", cache.poll_state());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Print every captured metric, grouped by kind and sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<(u8, String)> = vec![];

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let series = format!("{}{{{}}}", key.name(), labels.join(","));

        match value {
            DebugValue::Counter(v) => lines.push((0, format!("{} = {}", series, v))),
            DebugValue::Gauge(v) => lines.push((1, format!("{} = {:.0}", series, v.into_inner()))),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                lines.push((2, format!("{} count={} sum={:.4}s", series, samples.len(), sum)));
            }
        }
    }

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
        return;
    }

    lines.sort();
    for (kind, line) in lines {
        let tag = match kind {
            0 => "counter",
            1 => "gauge",
            _ => "histogram",
        };
        println!("   └─ [{}] {}", tag, line);
    }
}
