//! Per-invocation context threaded through every tool (spec §4.6): the
//! shared adapters plus a cancellation signal, mirroring the bundle the
//! teacher's `tools/*.rs` files receive instead of re-deriving a repo
//! handle and HTTP client in each tool body.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::forge::ForgeAdapter;
use crate::git::GitAdapter;
use crate::session::SessionStore;

/// A cooperative cancellation flag, checked at the same `tokio::select!`
/// boundaries the teacher's `operations::push::core::push` uses around its
/// child-process wait. Cloning shares the same underlying signal.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`Self::cancel`] has been called. Safe to race against
    /// other futures in `tokio::select!`; already-cancelled tokens resolve
    /// immediately rather than waiting for the next notification.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The bundle every workflow tool operates against: the workspace's git and
/// forge adapters, its session store, its config, and a per-call
/// cancellation token. Built once per tool invocation by the MCP/CLI
/// surface and passed down by reference.
pub struct ToolContext {
    pub workspace_root: PathBuf,
    pub config: Arc<Config>,
    pub git: Arc<dyn GitAdapter>,
    pub forge: Arc<dyn ForgeAdapter>,
    pub sessions: Arc<SessionStore>,
    pub audit: Arc<AuditLog>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(
        workspace_root: PathBuf,
        config: Arc<Config>,
        git: Arc<dyn GitAdapter>,
        forge: Arc<dyn ForgeAdapter>,
        sessions: Arc<SessionStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            workspace_root,
            config,
            git,
            forge,
            sessions,
            audit,
            cancel: CancellationToken::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_unblocks_waiters() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("cancellation should unblock the waiter promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_resolves_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .unwrap();
    }
}
