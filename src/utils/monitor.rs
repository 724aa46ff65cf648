#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Samples this process's CPU and resident memory after each video.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    // None when monitoring is off
    sampler: Option<Mutex<Sampler>>,
    started: Instant,
}

#[cfg(feature = "cli")]
struct Sampler {
    system: System,
    pid: Pid,
    peak_mb: u64,
}

#[cfg(feature = "cli")]
struct Sample {
    cpu: f32,
    memory_mb: u64,
    peak_mb: u64,
}

#[cfg(feature = "cli")]
impl Sampler {
    fn sample(&mut self) -> Option<Sample> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self.system.process(self.pid)?;

        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_mb = self.peak_mb.max(memory_mb);

        Some(Sample {
            cpu: process.cpu_usage(),
            memory_mb,
            peak_mb: self.peak_mb,
        })
    }
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let sampler = enabled
            .then(|| sysinfo::get_current_pid().ok())
            .flatten()
            .map(|pid| {
                let mut system = System::new();
                // primes the CPU counters so the first sample is meaningful
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                Mutex::new(Sampler {
                    system,
                    pid,
                    peak_mb: 0,
                })
            });

        Self {
            sampler,
            started: Instant::now(),
        }
    }

    fn sample(&self) -> Option<Sample> {
        self.sampler.as_ref()?.lock().ok()?.sample()
    }

    pub fn log_stats(&self, video: &str) {
        if let Some(sample) = self.sample() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Elapsed: {:?}",
                video,
                sample.cpu,
                sample.memory_mb,
                sample.peak_mb,
                self.started.elapsed()
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(sample) = self.sample() {
            tracing::info!(
                "📊 Run finished in {:?}, peak memory {}MB",
                self.started.elapsed(),
                sample.peak_mb
            );
        }
    }
}

// no-op stand-in when sysinfo is not compiled in
#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _video: &str) {}

    pub fn log_final_stats(&self) {}
}
