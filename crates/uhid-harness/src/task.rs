//! Cancellable local tasks.

use std::future::Future;

use tokio::task::JoinHandle;

/// Owns a `spawn_local` task and aborts it on [`cancel`](Self::cancel) or
/// drop. An aborted task never resumes its body.
#[derive(Debug)]
pub struct TaskGuard {
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    /// Spawns `future` on the current `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + 'static,
    {
        Self {
            handle: Some(tokio::task::spawn_local(future)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Schedules `future` as a deferred single-shot unit: it starts only after
/// the caller next yields to the event loop.
///
/// # Panics
///
/// Panics when called outside a `LocalSet`.
pub fn defer<F>(future: F) -> TaskGuard
where
    F: Future<Output = ()> + 'static,
{
    TaskGuard::spawn(async move {
        tokio::task::yield_now().await;
        future.await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test]
    async fn test_deferred_runs_after_yield() {
        LocalSet::new()
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                let guard = defer(async move { flag.set(true) });
                assert!(!ran.get());

                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                assert!(ran.get());
                assert!(!guard.is_active());
            })
            .await;
    }

    #[tokio::test]
    async fn test_cancelled_unit_never_runs() {
        LocalSet::new()
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                let mut guard = defer(async move { flag.set(true) });
                guard.cancel();
                guard.cancel();

                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                assert!(!ran.get());
                assert!(!guard.is_active());
            })
            .await;
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        LocalSet::new()
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = Rc::clone(&ran);
                drop(defer(async move { flag.set(true) }));

                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                assert!(!ran.get());
            })
            .await;
    }
}
