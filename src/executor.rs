use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use log::trace;
use queues::{IsQueue, Queue};
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
};

use crate::error::{TaskResult, TbError};
use crate::tb_obj::lock;

type ReadyQueue = Arc<Mutex<Queue<Arc<Task>>>>;

/// Single threaded executor. Tasks are polled in the order they were woken, which keeps a
/// run reproducible for a fixed seed.
#[derive(Clone)]
pub struct Executor {
    queue: ReadyQueue,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue::new())),
        }
    }

    pub fn spawn(
        &self,
        future: impl Future<Output = TaskResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name, self.queue.clone());
        schedule_task(&self.queue, task);
        join_handle
    }

    /// Polls ready tasks until the queue is empty. Returns the number of polls.
    #[inline]
    pub fn run_once(&self) -> usize {
        let mut polled = 0;
        while let Some(task) = next_task(&self.queue) {
            process_task(task);
            polled += 1;
        }
        polled
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.queue).size() == 0
    }
}

fn schedule_task(queue: &ReadyQueue, task: Arc<Task>) {
    // Queue::add only fails for bounded queues
    let _ = lock(queue).add(task);
}

fn next_task(queue: &ReadyQueue) -> Option<Arc<Task>> {
    lock(queue).remove().ok()
}

#[inline]
fn process_task(task: Arc<Task>) {
    if *lock(&task.state) != TaskState::Pending {
        // stale wake-up of a finished or cancelled task
        return;
    }

    let mut fut_slot = lock(&task.future);
    let Some(mut fut) = fut_slot.take() else {
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            // the task may have cancelled itself while running
            if *lock(&task.state) == TaskState::Pending {
                *fut_slot = Some(fut);
            }
        }
        Poll::Ready(result) => {
            drop(fut_slot);
            trace!("task '{}' done: {:?}", task.name, result);
            *lock(&task.state) = TaskState::Done;
            if let Some(tx) = lock(&task.join_tx).take() {
                let _ = tx.send(result);
            }
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TaskResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<TaskResult>>>,
    queue: ReadyQueue,
}

impl Task {
    fn new(
        fut: BoxFuture<'static, TaskResult>,
        name: &str,
        queue: ReadyQueue,
    ) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<TaskResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
            queue,
        });
        let join_handle = JoinHandle {
            task: task.clone(),
            join_rx: rx,
        };
        (task, join_handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        {
            let mut state = lock(&self.state);
            if *state != TaskState::Pending {
                return;
            }
            *state = TaskState::Cancelled;
        }
        trace!("task '{}' cancelled", self.name);
        // If the task is cancelling itself, its future is being polled right now and
        // process_task drops it once the poll returns.
        if let Ok(mut slot) = self.future.try_lock() {
            drop(slot.take());
        }
        if let Some(tx) = lock(&self.join_tx).take() {
            let _ = tx.send(Err(TbError::Cancelled));
        }
    }

    fn is_finished(&self) -> bool {
        *lock(&self.state) != TaskState::Pending
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(&arc_self.queue, arc_self.clone());
    }
}

/// Cancels a task without owning its JoinHandle.
#[derive(Clone)]
pub struct CancelToken {
    task: Weak<Task>,
}

impl CancelToken {
    pub fn cancel(&self) {
        if let Some(task) = self.task.upgrade() {
            task.cancel();
        }
    }
}

pub struct JoinHandle {
    task: Arc<Task>,
    join_rx: oneshot::Receiver<TaskResult>,
}

impl JoinHandle {
    pub fn name(&self) -> &str {
        self.task.name()
    }
    pub fn cancel(&self) {
        self.task.cancel();
    }
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            task: Arc::downgrade(&self.task),
        }
    }
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Future for JoinHandle {
    type Output = TaskResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // sender dropped without a result
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(TbError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
