//! Application state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use testflow_core::Config;
use testflow_store::ExecutionStore;

use crate::websocket::UpdateHub;

/// Application state shared across handlers.
pub struct AppState {
    pub store: ExecutionStore,
    pub config: Config,
    pub hub: UpdateHub,
    /// Cancellation tokens for in-flight executions, keyed by execution ID.
    running: DashMap<String, CancellationToken>,
    start_time: Instant,
    request_count: AtomicU64,
    /// Notifier for API-triggered shutdown.
    pub shutdown_notify: Arc<Notify>,
}

impl AppState {
    pub fn new(store: ExecutionStore, config: Config) -> Self {
        Self {
            store,
            config,
            hub: UpdateHub::new(),
            running: DashMap::new(),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            shutdown_notify: Arc::new(Notify::new()),
        }
    }

    /// Register a cancellation token for an execution about to run.
    pub fn register_running(&self, execution_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.running.insert(execution_id.to_string(), token.clone());
        token
    }

    /// Remove the token once the execution reaches a terminal state.
    pub fn unregister_running(&self, execution_id: &str) {
        self.running.remove(execution_id);
    }

    /// Cancel an in-flight execution. Returns false when nothing is running
    /// under that ID.
    pub fn cancel_running(&self, execution_id: &str) -> bool {
        match self.running.get(execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of executions currently in flight.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Get uptime.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get request count.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Increment request count.
    pub fn increment_requests(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_state() -> AppState {
        let store = ExecutionStore::in_memory().await.unwrap();
        AppState::new(store, Config::default())
    }

    #[tokio::test]
    async fn test_request_count() {
        let state = test_state().await;
        assert_eq!(state.request_count(), 0);

        state.increment_requests();
        state.increment_requests();
        assert_eq!(state.request_count(), 2);
    }

    #[tokio::test]
    async fn test_cancel_unknown_execution() {
        let state = test_state().await;
        assert!(!state.cancel_running("nope"));
    }

    #[tokio::test]
    async fn test_register_cancel_unregister() {
        let state = test_state().await;
        let token = state.register_running("exec-1");
        assert_eq!(state.running_count(), 1);
        assert!(!token.is_cancelled());

        assert!(state.cancel_running("exec-1"));
        assert!(token.is_cancelled());

        state.unregister_running("exec-1");
        assert_eq!(state.running_count(), 0);
        assert!(!state.cancel_running("exec-1"));
    }
}
