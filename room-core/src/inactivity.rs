use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Single-shot idle watchdog. Re-arming always cancels the pending fire, so
/// at most one expiry is ever scheduled per timer.
#[derive(Debug)]
pub struct InactivityTimer {
    duration: Duration,
    handle: Option<JoinHandle<()>>,
}

impl InactivityTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            handle: None,
        }
    }

    /// Cancel any pending expiry and schedule `on_expire` to run after the
    /// full idle duration.
    pub fn arm<F>(&mut self, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let duration = self.duration;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_expire.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
