//! Fixed-rate frame loop on its own thread.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use log::{debug, info};

use crate::{display::Display, host::ConsoleHost, Backend};

pub const TARGET_FPS: u32 = 60;
pub const TARGET_MS_PER_FRAME: Duration = Duration::from_nanos(1_000_000_000 / TARGET_FPS as u64);
/// Shortest sleep between frames, even when a frame overran.
pub const MIN_FRAME_SLEEP: Duration = Duration::from_millis(1);

/// A host shared between the driver and input handlers.
///
/// Every input update and every tick takes the lock, so a tick never sees
/// half an update.
pub type SharedHost<B, D> = Arc<Mutex<ConsoleHost<B, D>>>;

/// Lock a shared host, recovering it if a previous holder panicked.
pub fn lock<B: Backend, D: Display>(host: &SharedHost<B, D>) -> MutexGuard<'_, ConsoleHost<B, D>> {
    host.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How long to sleep after a frame that took `took`.
pub fn frame_delay(took: Duration) -> Duration {
    TARGET_MS_PER_FRAME.saturating_sub(took).max(MIN_FRAME_SLEEP)
}

/// Runs `start` once and then ticks a host at [`TARGET_FPS`] until stopped.
pub struct Driver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Driver {
    pub fn spawn<B, D>(host: SharedHost<B, D>) -> anyhow::Result<Self>
    where
        B: Backend + Send + 'static,
        D: Display + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("consolebox-driver".to_string())
            .spawn(move || run(host, flag))
            .context("spawning the driver thread")?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the loop and wait for the current frame to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("driver thread panicked");
            }
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<B: Backend, D: Display>(host: SharedHost<B, D>, running: Arc<AtomicBool>) {
    lock(&host).start();
    info!("driver running at {TARGET_FPS} fps");

    let mut last_frame_ms = 0;
    while running.load(Ordering::Acquire) {
        let start = Instant::now();
        lock(&host).tick(last_frame_ms);

        let took = start.elapsed();
        last_frame_ms = took.as_millis() as u64;
        debug!("frame took {last_frame_ms} ms");

        thread::sleep(frame_delay(took));
    }

    info!("driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        display::Canvas,
        host::{Fault, Gamepad, HostConfig},
        memory::VirtualMemory,
        Peripherals,
    };

    struct CountingBackend {
        memory: VirtualMemory<Vec<u8>>,
        peripherals: Peripherals,
        starts: usize,
        updates: usize,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                memory: VirtualMemory::new(1),
                peripherals: Peripherals::default(),
                starts: 0,
                updates: 0,
            }
        }
    }

    impl Backend for CountingBackend {
        fn call_start(&mut self) -> Result<(), Fault> {
            self.starts += 1;
            Ok(())
        }

        fn call_update(&mut self) -> Result<(), Fault> {
            self.updates += 1;
            Ok(())
        }

        fn memory(&self) -> VirtualMemory<&[u8]> {
            VirtualMemory::wrap(self.memory.as_bytes())
        }

        fn hardware_mut(&mut self) -> (VirtualMemory<&mut [u8]>, &mut Peripherals) {
            (
                VirtualMemory::wrap(self.memory.as_bytes_mut()),
                &mut self.peripherals,
            )
        }
    }

    #[test]
    fn frame_delay_has_floor() {
        assert_eq!(frame_delay(Duration::ZERO), TARGET_MS_PER_FRAME);
        assert_eq!(
            frame_delay(Duration::from_millis(10)),
            TARGET_MS_PER_FRAME - Duration::from_millis(10)
        );
        assert_eq!(frame_delay(Duration::from_millis(40)), MIN_FRAME_SLEEP);
    }

    #[test]
    fn ticks_until_stopped() {
        let host: SharedHost<_, _> = Arc::new(Mutex::new(ConsoleHost::new(
            CountingBackend::new(),
            Canvas::new(160, 160),
            HostConfig::default(),
        )));

        let driver = Driver::spawn(Arc::clone(&host)).unwrap();
        assert!(driver.is_running());

        // input arrives while the loop runs
        lock(&host)
            .set_gamepad(
                0,
                Gamepad {
                    primary: true,
                    ..Default::default()
                },
            )
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        driver.stop();

        let host = lock(&host);
        assert_eq!(host.backend().starts, 1);
        assert!(host.backend().updates > 0);
        assert_eq!(host.display().flushes(), host.backend().updates);
        assert_eq!(host.backend().memory().gamepad(0), 1);
    }

    #[test]
    fn recovers_poisoned_lock() {
        let host: SharedHost<_, _> = Arc::new(Mutex::new(ConsoleHost::new(
            CountingBackend::new(),
            Canvas::new(1, 1),
            HostConfig::default(),
        )));

        let poisoner = Arc::clone(&host);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(host.is_poisoned());
        assert!(!lock(&host).is_faulted());
    }
}
