//! Pauses between sends, rate-limit waits and shutdown requests
//!
//! Every suspension point of the relay goes through [`Pacer`], so tests can
//! observe the waits without actually sleeping.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Blocks the caller for a given duration
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

/// Real pacer backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Pacer that records requested pauses and returns immediately
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All pauses requested so far, in order
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }

    /// Sum of all requested pauses
    pub fn total(&self) -> Duration {
        self.pauses().iter().sum()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// How a shutdown request should be honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Finish the current cycle, then stop
    Graceful,
    /// Asked again while a graceful stop was pending
    Forced,
}

/// Cooperative cancellation shared between the signal handler and the loop
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<u32>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request; the first is graceful, any later one forced
    pub fn request(&self) -> ShutdownRequest {
        let (requests, wake) = &*self.inner;
        let mut requests = requests.lock().unwrap();
        *requests += 1;
        wake.notify_all();
        if *requests == 1 {
            ShutdownRequest::Graceful
        } else {
            ShutdownRequest::Forced
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.0.lock().unwrap() > 0
    }

    /// Sleep for up to `timeout`, waking early on a request
    ///
    /// Returns `true` if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (requests, wake) = &*self.inner;
        let guard = requests.lock().unwrap();
        let (guard, _) = wake
            .wait_timeout_while(guard, timeout, |requests| *requests == 0)
            .unwrap();
        *guard > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_pacer() {
        let pacer = RecordingPacer::new();
        pacer.pause(Duration::from_secs(3));
        pacer.pause(Duration::from_secs(900));
        assert_eq!(
            pacer.pauses(),
            vec![Duration::from_secs(3), Duration::from_secs(900)]
        );
        assert_eq!(pacer.total(), Duration::from_secs(903));
    }

    #[test]
    fn test_thread_pacer_zero_returns() {
        ThreadPacer.pause(Duration::ZERO);
    }

    #[test]
    fn test_shutdown_requests() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        assert!(!shutdown.wait(Duration::from_millis(1)));

        assert_eq!(shutdown.request(), ShutdownRequest::Graceful);
        assert!(shutdown.clone().is_requested());
        assert!(shutdown.wait(Duration::from_secs(60)));
        assert_eq!(shutdown.request(), ShutdownRequest::Forced);
    }
}
