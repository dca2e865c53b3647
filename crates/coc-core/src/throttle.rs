use std::{
    pin::pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Notify;
use tokio::time::sleep;

use crate::{errors::Error, Result};

/// How a blocked `acquire` learns that a slot may have freed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Sleep `retry_interval`, then re-check the counter.
    ///
    /// Waiters are not queued: one that started later can take a freed slot
    /// before one that has been waiting longer.
    Poll { retry_interval: Duration },
    /// Park on a notifier that every release signals.
    WakeOnRelease,
}

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Maximum number of requests allowed in flight at once.
    pub limit: usize,
    pub policy: AdmissionPolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            policy: AdmissionPolicy::Poll {
                retry_interval: Duration::from_millis(100),
            },
        }
    }
}

#[derive(Debug)]
struct Gate {
    limit: usize,
    in_flight: AtomicUsize,
    policy: AdmissionPolicy,
    released: Notify,
}

impl Gate {
    fn try_admit(&self) -> bool {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .is_ok()
    }
}

/// Concurrency admission gate shared by every endpoint call of one client.
///
/// Cloning is cheap and clones share the same counter.
#[derive(Clone, Debug)]
pub struct Throttler {
    gate: Arc<Gate>,
}

impl Throttler {
    pub fn new(cfg: ThrottleConfig) -> Result<Self> {
        if cfg.limit == 0 {
            return Err(Error::Config("throttle limit must be at least 1".to_string()));
        }
        Ok(Self {
            gate: Arc::new(Gate {
                limit: cfg.limit,
                in_flight: AtomicUsize::new(0),
                policy: cfg.policy,
                released: Notify::new(),
            }),
        })
    }

    pub fn limit(&self) -> usize {
        self.gate.limit
    }

    pub fn in_flight(&self) -> usize {
        self.gate.in_flight.load(Ordering::Acquire)
    }

    /// Non-blocking variant of [`Throttler::acquire`].
    pub fn try_acquire(&self) -> Option<ThrottlePermit> {
        self.gate.try_admit().then(|| self.permit())
    }

    /// Wait for a free slot and take it.
    ///
    /// Dropping the returned future before it resolves leaves the counter untouched.
    pub async fn acquire(&self) -> ThrottlePermit {
        if let Some(permit) = self.try_acquire() {
            return permit;
        }
        tracing::debug!(limit = self.gate.limit, "throttle saturated; waiting for a slot");

        loop {
            match self.gate.policy {
                AdmissionPolicy::Poll { retry_interval } => {
                    if self.gate.try_admit() {
                        return self.permit();
                    }
                    sleep(retry_interval).await;
                }
                AdmissionPolicy::WakeOnRelease => {
                    // Register before re-checking so a release in between is not lost.
                    let mut notified = pin!(self.gate.released.notified());
                    notified.as_mut().enable();
                    if self.gate.try_admit() {
                        return self.permit();
                    }
                    notified.await;
                }
            }
        }
    }

    fn permit(&self) -> ThrottlePermit {
        ThrottlePermit {
            gate: Arc::clone(&self.gate),
        }
    }
}

/// A held throttle slot. The slot is returned when the permit is dropped.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct ThrottlePermit {
    gate: Arc<Gate>,
}

impl ThrottlePermit {
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ThrottlePermit {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::AcqRel);
        if self.gate.policy == AdmissionPolicy::WakeOnRelease {
            self.gate.released.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    fn poll(limit: usize) -> Throttler {
        Throttler::new(ThrottleConfig {
            limit,
            policy: AdmissionPolicy::Poll {
                retry_interval: Duration::from_millis(5),
            },
        })
        .unwrap()
    }

    fn wake(limit: usize) -> Throttler {
        Throttler::new(ThrottleConfig {
            limit,
            policy: AdmissionPolicy::WakeOnRelease,
        })
        .unwrap()
    }

    #[test]
    fn zero_limit_is_rejected() {
        let err = Throttler::new(ThrottleConfig {
            limit: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn limit_plus_one_waits_for_release() {
        for t in [poll(3), wake(3)] {
            let mut held = Vec::new();
            for _ in 0..3 {
                let p = timeout(Duration::from_millis(200), t.acquire())
                    .await
                    .expect("first N acquires must not block");
                held.push(p);
            }
            assert_eq!(t.in_flight(), 3);

            let blocked = timeout(Duration::from_millis(50), t.acquire()).await;
            assert!(blocked.is_err(), "N+1th acquire completed while full");
            assert_eq!(t.in_flight(), 3);

            let waiter = tokio::spawn({
                let t = t.clone();
                async move { t.acquire().await }
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!waiter.is_finished());

            held.remove(1).release();
            let p = timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter not admitted after release")
                .unwrap();
            assert_eq!(t.in_flight(), 3);

            drop(p);
            drop(held);
            assert_eq!(t.in_flight(), 0);
        }
    }

    #[tokio::test]
    async fn try_acquire_respects_limit() {
        let t = poll(1);
        let p = t.try_acquire().expect("slot free");
        assert!(t.try_acquire().is_none());
        p.release();
        assert!(t.try_acquire().is_some());
        assert_eq!(t.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit_under_contention() {
        for t in [poll(4), wake(4)] {
            let peak = Arc::new(AtomicUsize::new(0));
            let mut tasks = Vec::new();
            for i in 0..64u64 {
                let t = t.clone();
                let peak = Arc::clone(&peak);
                tasks.push(tokio::spawn(async move {
                    let permit = t.acquire().await;
                    let now = t.in_flight();
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1 + i % 3)).await;
                    drop(permit);
                }));
            }
            for task in tasks {
                task.await.unwrap();
            }
            assert!(peak.load(Ordering::SeqCst) <= 4);
            assert_eq!(t.in_flight(), 0);
        }
    }

    #[tokio::test]
    async fn released_on_error_and_out_of_order() {
        let t = wake(2);

        async fn guarded(t: &Throttler, fail: bool) -> Result<()> {
            let _permit = t.acquire().await;
            if fail {
                return Err(Error::Transport("boom".to_string()));
            }
            Ok(())
        }

        assert!(guarded(&t, true).await.is_err());
        assert_eq!(t.in_flight(), 0);
        assert!(guarded(&t, false).await.is_ok());
        assert_eq!(t.in_flight(), 0);

        let a = t.acquire().await;
        let b = t.acquire().await;
        drop(b);
        assert_eq!(t.in_flight(), 1);
        drop(a);
        assert_eq!(t.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_takes_no_slot() {
        let t = poll(1);
        let held = t.acquire().await;
        let cancelled = timeout(Duration::from_millis(20), t.acquire()).await;
        assert!(cancelled.is_err());
        assert_eq!(t.in_flight(), 1);
        drop(held);
        assert_eq!(t.in_flight(), 0);
    }
}
