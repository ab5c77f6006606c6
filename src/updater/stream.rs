//! Task-To-Stream Bridge
//!
//! Converts the push-style listener API of [`Task`] into a pull-style
//! asynchronous sequence of at most one element, so dependent steps can be
//! written as plain sequential awaits instead of nested callback
//! registrations.
//!
//! Listener registration is lazy (first poll) and teardown is a scoped
//! resource: the registrations are detached on success, failure, empty
//! completion, and consumer cancellation alike.

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;

use super::task::{InstallFailure, ListenerId, Task};

/// Why a driven task produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task was rejected; the payload is surfaced verbatim.
    #[error("update task failed: {0}")]
    Failed(#[from] InstallFailure),
    /// The task completed without a value and without an error.
    #[error("update task completed without producing a result")]
    NoResult,
}

enum TaskEvent<T> {
    Value(T),
    Failed(InstallFailure),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    ValueEmitted,
    Terminated,
}

// Holds the three registrations alive until released or dropped.
struct ListenerGuard<T> {
    task: Task<T>,
    ids: [ListenerId; 3],
    released: bool,
}

impl<T> ListenerGuard<T> {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            for id in self.ids {
                self.task.remove_listener(id);
            }
        }
    }
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Asynchronous sequence over a [`Task`]: at most one `Ok` value, a failure
/// terminates the sequence with `Err`, a bare completion ends it empty.
pub struct TaskStream<T> {
    task: Task<T>,
    // None until the first poll registers the listeners.
    wired: Option<(mpsc::UnboundedReceiver<TaskEvent<T>>, ListenerGuard<T>)>,
    phase: Phase,
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Bridges this task's listeners into an awaitable stream.
    pub fn into_stream(self) -> TaskStream<T> {
        TaskStream {
            task: self,
            wired: None,
            phase: Phase::Pending,
        }
    }
}

impl<T: Clone + Send + 'static> TaskStream<T> {
    /// Drives the sequence to its first element.
    ///
    /// Returns the emitted value, propagates a rejection as
    /// [`TaskError::Failed`], and maps an empty completion to
    /// [`TaskError::NoResult`]. Consumes the stream, which detaches the
    /// listener registrations on the way out.
    pub async fn first(mut self) -> Result<T, TaskError> {
        match self.next().await {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => Err(TaskError::Failed(failure)),
            None => Err(TaskError::NoResult),
        }
    }
}

fn wire<T: Clone + Send + 'static>(
    task: &Task<T>,
) -> (mpsc::UnboundedReceiver<TaskEvent<T>>, ListenerGuard<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let on_value = tx.clone();
    let on_failure = tx.clone();
    let on_complete = tx;
    let ids = [
        task.on_success(move |value: &T| {
            let _ = on_value.send(TaskEvent::Value(value.clone()));
        }),
        task.on_failure(move |failure| {
            let _ = on_failure.send(TaskEvent::Failed(failure.clone()));
        }),
        task.on_complete(move || {
            let _ = on_complete.send(TaskEvent::Completed);
        }),
    ];
    (
        rx,
        ListenerGuard {
            task: task.clone(),
            ids,
            released: false,
        },
    )
}

impl<T: Clone + Send + 'static> Stream for TaskStream<T> {
    type Item = Result<T, InstallFailure>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.phase == Phase::Terminated {
                return Poll::Ready(None);
            }
            if this.wired.is_none() {
                this.wired = Some(wire(&this.task));
            }
            let Some((events, guard)) = this.wired.as_mut() else {
                return Poll::Pending;
            };
            match events.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                // Senders live inside the task's listeners; a closed channel
                // means they are gone and nothing further can arrive.
                Poll::Ready(None) => {
                    this.phase = Phase::Terminated;
                    guard.release();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(TaskEvent::Value(value))) => {
                    if this.phase == Phase::Pending {
                        this.phase = Phase::ValueEmitted;
                        return Poll::Ready(Some(Ok(value)));
                    }
                }
                Poll::Ready(Some(TaskEvent::Failed(failure))) => {
                    this.phase = Phase::Terminated;
                    guard.release();
                    return Poll::Ready(Some(Err(failure)));
                }
                Poll::Ready(Some(TaskEvent::Completed)) => {
                    this.phase = Phase::Terminated;
                    guard.release();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::task::InstallErrorCode;

    #[tokio::test]
    async fn first_returns_resolved_value() {
        let (completer, task) = Task::pending();
        let pending = task.clone().into_stream().first();
        completer.resolve("ready".to_string());
        assert_eq!(pending.await.unwrap(), "ready");
        assert_eq!(task.listener_count(), 0);
    }

    #[tokio::test]
    async fn first_on_settled_task_still_observes_the_value() {
        let task = Task::resolved(31u64);
        assert_eq!(task.into_stream().first().await.unwrap(), 31);
    }

    #[tokio::test]
    async fn rejection_propagates_verbatim() {
        let failure = InstallFailure::new(InstallErrorCode::StoreNotFound, "no store app");
        let task = Task::<u64>::rejected(failure.clone());
        assert_eq!(
            task.into_stream().first().await,
            Err(TaskError::Failed(failure))
        );
    }

    #[tokio::test]
    async fn bare_completion_maps_to_no_result() {
        let (completer, task) = Task::<u64>::pending();
        completer.cancel();
        assert_eq!(task.into_stream().first().await, Err(TaskError::NoResult));
    }

    #[tokio::test]
    async fn at_most_one_element_then_end_of_stream() {
        let (completer, task) = Task::pending();
        completer.resolve(5u64);

        let mut stream = task.into_stream();
        assert_eq!(stream.next().await, Some(Ok(5)));
        // The trailing completion event ends the sequence.
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn dropping_the_stream_detaches_all_listeners() {
        let (_completer, task) = Task::<u64>::pending();
        let mut stream = task.clone().into_stream();

        // Nothing is registered before the first poll.
        assert_eq!(task.listener_count(), 0);
        let probe = futures_util::poll!(stream.next());
        assert!(probe.is_pending());
        assert_eq!(task.listener_count(), 3);

        drop(stream);
        assert_eq!(task.listener_count(), 0);
    }

    #[tokio::test]
    async fn terminated_stream_has_no_registrations_left() {
        let (completer, task) = Task::<u64>::pending();
        completer.reject(InstallFailure::new(InstallErrorCode::Internal, "boom"));

        let mut stream = task.clone().into_stream();
        assert!(stream.next().await.unwrap().is_err());
        assert_eq!(task.listener_count(), 0);
    }
}
