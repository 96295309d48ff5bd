use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::clock::{Clock, TickEvent, TickListener};

const LATE_TOLERANCE_MS: i64 = 20;
const MIN_BENCH_DURATION: Duration = Duration::from_secs(3);
const MIN_BENCH_TICKS: u32 = 3;

pub struct TickStats {
    total_ticks: u64,
    late_ticks: u64,
    target_ms: i64,
    last_timestamp: Option<i64>,
    window_size: usize,
    window: VecDeque<i64>,
    jitter_histogram: [u64; 5],
}

impl TickStats {
    pub fn new(window_size: usize, target: Duration) -> Self {
        Self {
            total_ticks: 0,
            late_ticks: 0,
            target_ms: i64::try_from(target.as_millis()).unwrap_or(i64::MAX),
            last_timestamp: None,
            window_size: window_size.max(1),
            window: VecDeque::with_capacity(window_size.max(1)),
            jitter_histogram: [0; 5],
        }
    }

    pub fn record_tick(&mut self, event: &TickEvent) {
        self.total_ticks += 1;
        let previous = self.last_timestamp.replace(event.timestamp);
        let Some(previous) = previous else {
            return;
        };

        let spacing = event.timestamp - previous;
        if spacing > self.target_ms.saturating_add(LATE_TOLERANCE_MS) {
            self.late_ticks += 1;
        }
        if self.window.len() == self.window_size {
            let _ = self.window.pop_front();
        }
        self.window.push_back(spacing);
        self.update_histogram((spacing - self.target_ms).abs());
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    pub fn mean_spacing_ms(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<i64>() as f64 / self.window.len() as f64
    }

    pub fn max_jitter_ms(&self) -> i64 {
        self.window
            .iter()
            .map(|spacing| (spacing - self.target_ms).abs())
            .max()
            .unwrap_or(0)
    }

    pub fn histogram(&self) -> [u64; 5] {
        self.jitter_histogram
    }

    fn update_histogram(&mut self, jitter_ms: i64) {
        let bucket = if jitter_ms <= 1 {
            0
        } else if jitter_ms <= 5 {
            1
        } else if jitter_ms <= 20 {
            2
        } else if jitter_ms <= 100 {
            3
        } else {
            4
        };
        self.jitter_histogram[bucket] += 1;
    }
}

pub fn run_diagnostics(clock: &Clock) -> Result<()> {
    let interval = clock.interval();
    let bench = MIN_BENCH_DURATION.max(interval * MIN_BENCH_TICKS);
    println!("worldclock diagnostics");
    println!("Tick interval: {} ms", interval.as_millis());
    println!("Clock running: {}", clock.is_running());
    println!("Sampling ticks for {:.1} s...", bench.as_secs_f64());

    let (tx, rx) = channel::<TickEvent>();
    let listener: TickListener = Arc::new(move |event: &TickEvent| {
        let _ = tx.send(*event);
    });
    clock.subscribe(Arc::clone(&listener));

    let mut stats = TickStats::new(512, interval);
    let deadline = Instant::now() + bench;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match rx.recv_timeout(remaining) {
            Ok(event) => stats.record_tick(&event),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    clock.unsubscribe(&listener);

    println!("Tick summary:");
    println!("  Ticks delivered: {}", stats.total_ticks());
    println!("  Late ticks: {}", stats.late_ticks());
    println!("  Mean spacing: {:.1} ms", stats.mean_spacing_ms());
    println!("  Max jitter: {} ms", stats.max_jitter_ms());
    println!("  Jitter histogram buckets (<=1, <=5, <=20, <=100, >100 ms):");
    println!("  {:?}", stats.histogram());
    Ok(())
}
