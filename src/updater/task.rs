//! Single-Result Task Primitive
//!
//! Mirrors the callback contract of platform update managers: a task settles
//! exactly once with a value, a failure, or a bare completion, and notifies
//! success/failure listeners before completion listeners. Listeners can be
//! detached again, which is what the stream bridge relies on for cleanup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Platform-style reason codes a task can be rejected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallErrorCode {
    /// The update API is not available on this device.
    ApiNotAvailable,
    /// No store app was found to drive the update.
    StoreNotFound,
    /// The update is not allowed right now (e.g. host not in the foreground).
    InstallNotAllowed,
    /// The flow was started without a completed download.
    DownloadNotPresent,
    /// The user dismissed the update UI.
    UserCanceled,
    /// Unspecified store-side failure.
    Internal,
}

impl fmt::Display for InstallErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ApiNotAvailable => "api-not-available",
            Self::StoreNotFound => "store-not-found",
            Self::InstallNotAllowed => "install-not-allowed",
            Self::DownloadNotPresent => "download-not-present",
            Self::UserCanceled => "user-canceled",
            Self::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

/// Failure payload carried by a rejected task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct InstallFailure {
    pub code: InstallErrorCode,
    pub message: String,
}

impl InstallFailure {
    pub fn new(code: InstallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Identifies a registered listener so it can be detached later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SuccessFn<T> = Box<dyn FnOnce(&T) + Send>;
type FailureFn = Box<dyn FnOnce(&InstallFailure) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

enum Listener<T> {
    Success(SuccessFn<T>),
    Failure(FailureFn),
    Complete(CompleteFn),
}

/// Terminal outcome of a settled task.
#[derive(Clone)]
enum Outcome<T> {
    Value(T),
    Failure(InstallFailure),
    Canceled,
}

enum TaskState<T> {
    Pending(Vec<(ListenerId, Listener<T>)>),
    Settled(Outcome<T>),
}

struct Inner<T> {
    state: TaskState<T>,
    next_listener_id: u64,
}

/// An in-flight single-result operation, as handed out by an update manager.
///
/// `Task` is a cheap handle; clones observe the same underlying operation.
pub struct Task<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Producer half of a [`Task`]. Settles the task exactly once.
pub struct TaskCompleter<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Creates an unsettled task and the completer that settles it.
    pub fn pending() -> (TaskCompleter<T>, Task<T>) {
        let inner = Arc::new(Mutex::new(Inner {
            state: TaskState::Pending(Vec::new()),
            next_listener_id: 0,
        }));
        (
            TaskCompleter {
                inner: Arc::clone(&inner),
            },
            Task { inner },
        )
    }

    /// Creates a task that is already resolved with `value`.
    pub fn resolved(value: T) -> Task<T> {
        let (completer, task) = Task::pending();
        completer.resolve(value);
        task
    }

    /// Creates a task that is already rejected with `failure`.
    pub fn rejected(failure: InstallFailure) -> Task<T> {
        let (completer, task) = Task::pending();
        completer.reject(failure);
        task
    }

    /// Registers a listener fired once if the task resolves with a value.
    pub fn on_success(&self, f: impl FnOnce(&T) + Send + 'static) -> ListenerId {
        self.register(Listener::Success(Box::new(f)))
    }

    /// Registers a listener fired once if the task is rejected.
    pub fn on_failure(&self, f: impl FnOnce(&InstallFailure) + Send + 'static) -> ListenerId {
        self.register(Listener::Failure(Box::new(f)))
    }

    /// Registers a listener fired once when the task settles, whichever way.
    pub fn on_complete(&self, f: impl FnOnce() + Send + 'static) -> ListenerId {
        self.register(Listener::Complete(Box::new(f)))
    }

    // Listeners registered after the terminal event fire immediately, outside
    // the lock: user callbacks may re-enter the task.
    fn register(&self, listener: Listener<T>) -> ListenerId {
        let (id, fire) = {
            let mut inner = self.inner.lock().unwrap();
            let id = ListenerId(inner.next_listener_id);
            inner.next_listener_id += 1;
            match &mut inner.state {
                TaskState::Pending(listeners) => {
                    listeners.push((id, listener));
                    (id, None)
                }
                TaskState::Settled(outcome) => (id, Some((outcome.clone(), listener))),
            }
        };
        if let Some((outcome, listener)) = fire {
            dispatch(vec![(id, listener)], &outcome);
        }
        id
    }
}

impl<T> Task<T> {
    /// Detaches a listener. Returns `false` if it already fired or was
    /// detached before.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if let TaskState::Pending(listeners) = &mut inner.state {
            let before = listeners.len();
            listeners.retain(|(lid, _)| *lid != id);
            return listeners.len() != before;
        }
        false
    }

    /// Whether the task has reached its terminal event.
    pub fn is_settled(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, TaskState::Settled(_))
    }

    pub(crate) fn listener_count(&self) -> usize {
        match &self.inner.lock().unwrap().state {
            TaskState::Pending(listeners) => listeners.len(),
            TaskState::Settled(_) => 0,
        }
    }
}

impl<T: Clone + Send + 'static> TaskCompleter<T> {
    /// Settles the task with a value. Returns `false` if it already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Outcome::Value(value))
    }

    /// Settles the task with a failure. Returns `false` if it already settled.
    pub fn reject(&self, failure: InstallFailure) -> bool {
        self.settle(Outcome::Failure(failure))
    }

    /// Settles the task with a bare completion: no value, no error. Returns
    /// `false` if it already settled.
    pub fn cancel(&self) -> bool {
        self.settle(Outcome::Canceled)
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let listeners = {
            let mut inner = self.inner.lock().unwrap();
            if matches!(inner.state, TaskState::Settled(_)) {
                return false;
            }
            let previous = std::mem::replace(&mut inner.state, TaskState::Settled(outcome.clone()));
            match previous {
                TaskState::Pending(listeners) => listeners,
                TaskState::Settled(_) => return false,
            }
        };
        dispatch(listeners, &outcome);
        true
    }
}

// Success/failure listeners fire before completion listeners, in registration
// order within each kind.
fn dispatch<T>(listeners: Vec<(ListenerId, Listener<T>)>, outcome: &Outcome<T>) {
    let mut completions = Vec::new();
    for (_, listener) in listeners {
        match (listener, outcome) {
            (Listener::Success(f), Outcome::Value(value)) => f(value),
            (Listener::Failure(f), Outcome::Failure(failure)) => f(failure),
            (Listener::Complete(f), _) => completions.push(f),
            _ => {}
        }
    }
    for f in completions {
        f();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event_log() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = {
            let log = Arc::clone(&log);
            move |entry: &str| log.lock().unwrap().push(entry.to_string())
        };
        (log, push)
    }

    #[test]
    fn resolve_fires_success_then_complete() {
        let (log, push) = event_log();
        let (completer, task) = Task::pending();

        let p = push.clone();
        task.on_complete(move || p("complete"));
        let p = push.clone();
        task.on_success(move |value: &u32| p(&format!("success:{}", value)));

        assert!(completer.resolve(7));
        assert_eq!(*log.lock().unwrap(), vec!["success:7", "complete"]);
    }

    #[test]
    fn reject_fires_failure_then_complete() {
        let (log, push) = event_log();
        let (completer, task) = Task::<u32>::pending();

        let p = push.clone();
        task.on_success(move |_: &u32| p("success"));
        let p = push.clone();
        task.on_failure(move |failure| p(&format!("failure:{}", failure.code)));
        let p = push.clone();
        task.on_complete(move || p("complete"));

        assert!(completer.reject(InstallFailure::new(
            InstallErrorCode::Internal,
            "store exploded"
        )));
        assert_eq!(*log.lock().unwrap(), vec!["failure:internal", "complete"]);
    }

    #[test]
    fn cancel_fires_complete_only() {
        let (log, push) = event_log();
        let (completer, task) = Task::<u32>::pending();

        let p = push.clone();
        task.on_success(move |_: &u32| p("success"));
        let p = push.clone();
        task.on_failure(move |_| p("failure"));
        let p = push.clone();
        task.on_complete(move || p("complete"));

        assert!(completer.cancel());
        assert_eq!(*log.lock().unwrap(), vec!["complete"]);
    }

    #[test]
    fn second_terminal_is_refused() {
        let fired = Arc::new(AtomicUsize::new(0));
        let (completer, task) = Task::pending();

        let count = Arc::clone(&fired);
        task.on_success(move |_: &u32| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        assert!(completer.resolve(1));
        assert!(!completer.resolve(2));
        assert!(!completer.reject(InstallFailure::new(InstallErrorCode::Internal, "late")));
        assert!(!completer.cancel());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(task.is_settled());
    }

    #[test]
    fn late_registration_fires_immediately() {
        let (log, push) = event_log();
        let task = Task::resolved(42u32);

        let p = push.clone();
        task.on_success(move |value: &u32| p(&format!("success:{}", value)));
        let p = push.clone();
        task.on_complete(move || p("complete"));

        assert_eq!(*log.lock().unwrap(), vec!["success:42", "complete"]);
    }

    #[test]
    fn removed_listener_does_not_fire() {
        let (log, push) = event_log();
        let (completer, task) = Task::pending();

        let p = push.clone();
        let id = task.on_success(move |_: &u32| p("removed"));
        let p = push.clone();
        task.on_success(move |_: &u32| p("kept"));

        assert_eq!(task.listener_count(), 2);
        assert!(task.remove_listener(id));
        assert!(!task.remove_listener(id));
        assert_eq!(task.listener_count(), 1);

        completer.resolve(1);
        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
        assert_eq!(task.listener_count(), 0);
    }
}
