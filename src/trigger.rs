use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::signal::SignalId;
use crate::sim::Kernel;
use crate::tb_obj::lock;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

impl EdgeKind {
    /// Edge seen on a committed value change. Rising/falling is judged on bit 0.
    pub(crate) fn of_change(old: u64, new: u64) -> Option<EdgeKind> {
        match (old & 1, new & 1) {
            (0, 1) => Some(EdgeKind::Rising),
            (1, 0) => Some(EdgeKind::Falling),
            _ => None,
        }
    }

    pub(crate) fn matches(self, seen: Option<EdgeKind>) -> bool {
        self == EdgeKind::Any || Some(self) == seen
    }
}

// Shared between an awaiting Trigger and the kernel. The kernel only keeps a Weak
// reference, so a dropped Trigger silently unregisters itself.
#[derive(Debug)]
pub(crate) struct TrigShared {
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl TrigShared {
    pub(crate) fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        if let Some(waker) = lock(&self.waker).take() {
            waker.wake();
        }
    }
    fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum TrigKind {
    Edge(SignalId, EdgeKind),
    // relative delay in simulation steps, made absolute on first poll
    Timer(u64),
    ReadOnly,
}

pub struct Trigger {
    kind: TrigKind,
    kernel: Arc<Mutex<Kernel>>,
    shared: Option<Arc<TrigShared>>,
}

impl Trigger {
    pub(crate) fn new(kind: TrigKind, kernel: Arc<Mutex<Kernel>>) -> Self {
        Trigger {
            kind,
            kernel,
            shared: None,
        }
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(shared) = &self.shared {
            // A task can be woken by something other than this trigger, so only the
            // fired flag counts.
            if shared.has_fired() {
                return Poll::Ready(());
            }
            *lock(&shared.waker) = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let shared = Arc::new(TrigShared {
            fired: AtomicBool::new(false),
            waker: Mutex::new(Some(cx.waker().clone())),
        });
        lock(&self.kernel).register(self.kind, Arc::downgrade(&shared));
        self.shared = Some(shared);
        Poll::Pending
    }
}
