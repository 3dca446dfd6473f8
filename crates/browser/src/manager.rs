//! Owner of the single shared browser.

use std::sync::Arc;

use {
    tokio::sync::{Mutex, RwLock},
    tracing::{info, warn},
};

use crate::{
    chromium::ChromiumLauncher,
    engine::{BrowserEngine, Launcher},
    error::BrowserError,
    types::{BrowserConfig, BrowserState},
};

#[derive(Default)]
struct Slot {
    state: BrowserState,
    handle: Option<Arc<dyn BrowserEngine>>,
}

/// Hands out one shared browser engine, launching it on first use and again
/// after it disconnects.
///
/// Launches are single-flight: callers arriving during a launch wait for it
/// and then share its result. Status reads never wait on a launch.
pub struct BrowserManager {
    config: BrowserConfig,
    launcher: Arc<dyn Launcher>,
    slot: RwLock<Slot>,
    launch_lock: Mutex<()>,
}

impl BrowserManager {
    pub fn new(config: BrowserConfig) -> Self {
        Self::with_launcher(config, Arc::new(ChromiumLauncher))
    }

    pub fn with_launcher(config: BrowserConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            config,
            launcher,
            slot: RwLock::new(Slot::default()),
            launch_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Return the live engine, launching one if there is none.
    pub async fn acquire(&self) -> Result<Arc<dyn BrowserEngine>, BrowserError> {
        if let Some(engine) = self.live_handle().await {
            return Ok(engine);
        }

        let _launch = self.launch_lock.lock().await;

        // Another caller may have finished launching while we waited.
        if let Some(engine) = self.live_handle().await {
            return Ok(engine);
        }

        let previous = {
            let mut slot = self.slot.write().await;
            std::mem::replace(&mut slot.state, BrowserState::Launching)
        };
        info!(previous = %previous, headless = self.config.headless, "launching browser");

        match self.launcher.launch(&self.config).await {
            Ok(engine) => {
                let mut slot = self.slot.write().await;
                slot.state = BrowserState::Ready;
                slot.handle = Some(Arc::clone(&engine));
                info!("browser ready");
                Ok(engine)
            },
            Err(e) => {
                self.slot.write().await.state = previous;
                warn!(error = %e, "browser launch failed");
                Err(e)
            },
        }
    }

    /// Current state, after noticing a dropped connection if there is one.
    pub async fn state(&self) -> BrowserState {
        self.live_handle().await;
        self.slot.read().await.state
    }

    /// Whether a live engine exists. Never launches.
    pub async fn is_connected(&self) -> bool {
        self.live_handle().await.is_some()
    }

    /// Close the engine, if any, and return to `Uninitialized`.
    pub async fn shutdown(&self) {
        let _launch = self.launch_lock.lock().await;
        let handle = {
            let mut slot = self.slot.write().await;
            slot.state = BrowserState::Uninitialized;
            slot.handle.take()
        };
        let Some(engine) = handle else {
            return;
        };
        if let Err(e) = engine.close().await {
            warn!(error = %e, "failed to close browser");
        }
        info!("browser manager shut down");
    }

    /// The stored handle if it is still connected. A dead handle is dropped
    /// and the state moves to `Disconnected`.
    async fn live_handle(&self) -> Option<Arc<dyn BrowserEngine>> {
        {
            let slot = self.slot.read().await;
            match slot.handle.as_ref() {
                None => return None,
                Some(engine) if engine.is_connected() => return Some(Arc::clone(engine)),
                Some(_) => {},
            }
        }

        let mut slot = self.slot.write().await;
        if slot.handle.as_ref().is_some_and(|e| !e.is_connected()) {
            slot.handle = None;
            slot.state = BrowserState::Disconnected;
            warn!("browser disconnected");
        }
        slot.handle.clone()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::FakeLauncher, std::time::Duration};

    fn manager(launcher: &Arc<FakeLauncher>) -> BrowserManager {
        BrowserManager::with_launcher(
            BrowserConfig::default(),
            Arc::clone(launcher) as Arc<dyn Launcher>,
        )
    }

    #[tokio::test]
    async fn starts_uninitialized_without_launching() {
        let launcher = Arc::new(FakeLauncher::new());
        let manager = manager(&launcher);
        assert_eq!(manager.state().await, BrowserState::Uninitialized);
        assert!(!manager.is_connected().await);
        assert_eq!(launcher.stats().launches(), 0);
    }

    #[tokio::test]
    async fn acquire_launches_once_and_reuses() {
        let launcher = Arc::new(FakeLauncher::new());
        let manager = manager(&launcher);

        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.stats().launches(), 1);
        assert_eq!(manager.state().await, BrowserState::Ready);
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn concurrent_cold_start_is_single_flight() {
        let launcher = Arc::new(FakeLauncher::new().with_launch_delay(Duration::from_millis(50)));
        let manager = Arc::new(manager(&launcher));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.acquire().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(launcher.stats().launches(), 1);
    }

    #[tokio::test]
    async fn relaunches_after_disconnect() {
        let launcher = Arc::new(FakeLauncher::new());
        let manager = manager(&launcher);

        let first = manager.acquire().await.unwrap();
        launcher.disconnect_all();
        assert_eq!(manager.state().await, BrowserState::Disconnected);
        assert!(!manager.is_connected().await);

        let second = manager.acquire().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.stats().launches(), 2);
        assert_eq!(manager.state().await, BrowserState::Ready);
    }

    #[tokio::test]
    async fn failed_launch_restores_previous_state() {
        let launcher = Arc::new(FakeLauncher::new());
        launcher.fail_launches(true);
        let manager = manager(&launcher);

        let err = manager.acquire().await.err().unwrap();
        assert!(matches!(err, BrowserError::LaunchFailed(_)));
        assert_eq!(manager.state().await, BrowserState::Uninitialized);

        launcher.fail_launches(false);
        manager.acquire().await.unwrap();
        launcher.disconnect_all();
        launcher.fail_launches(true);
        assert!(manager.acquire().await.is_err());
        assert_eq!(manager.state().await, BrowserState::Disconnected);
    }

    #[tokio::test]
    async fn shutdown_closes_engine() {
        let launcher = Arc::new(FakeLauncher::new());
        let manager = manager(&launcher);
        manager.acquire().await.unwrap();

        manager.shutdown().await;
        assert_eq!(manager.state().await, BrowserState::Uninitialized);
        assert_eq!(launcher.stats().engines_closed(), 1);

        // Idempotent.
        manager.shutdown().await;
        assert_eq!(launcher.stats().engines_closed(), 1);
    }
}
