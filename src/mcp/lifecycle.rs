// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session lifecycle management.
//!
//! The manager holds the only strong references to MCP sessions. Sessions are
//! recorded in the order their transports opened and closed in the reverse
//! order, exactly once, on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::client::McpClient;
use super::error::McpError;

/// Owns every opened session and tears them down.
#[derive(Debug, Default)]
pub struct LifecycleManager {
    handles: Mutex<Vec<Arc<McpClient>>>,
    shut_down: AtomicBool,
}

impl LifecycleManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened session. Returns its acquisition index.
    pub fn register(&self, handle: Arc<McpClient>) -> usize {
        let mut handles = self.lock();
        tracing::debug!(server = %handle.name(), index = handles.len(), "Registered MCP session");
        handles.push(handle);
        handles.len() - 1
    }

    /// Registered sessions, in acquisition order.
    pub fn handles(&self) -> Vec<Arc<McpClient>> {
        self.lock().clone()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `shutdown` has already run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<McpClient>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close every session in reverse acquisition order.
    ///
    /// Runs at most once; later calls return `Ok(())`. Benign teardown errors
    /// are logged and dropped. Every session is attempted even after a
    /// failure, and the first non-benign error is returned at the end.
    pub async fn shutdown(&self) -> Result<(), McpError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let handles: Vec<_> = std::mem::take(&mut *self.lock());
        tracing::info!(sessions = handles.len(), "Shutting down MCP sessions");

        let mut first_error = None;

        for handle in handles.into_iter().rev() {
            match handle.close().await {
                Ok(()) => tracing::debug!(server = %handle.name(), "Closed MCP session"),
                Err(e) if e.is_benign_teardown() => {
                    tracing::info!(
                        server = %handle.name(),
                        error = %e,
                        "Ignoring benign teardown error"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        server = %handle.name(),
                        error = %e,
                        "Failed to close MCP session"
                    );
                    if first_error.is_none() {
                        first_error = Some(match e {
                            McpError::Teardown { .. } => e,
                            other => McpError::Teardown {
                                server: handle.name().to_string(),
                                message: other.to_string(),
                            },
                        });
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
