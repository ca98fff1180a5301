//! Application pause/resume coordination.
//!
//! The embedding application reports pause and resume through a
//! [`LifecycleHooks`] implementation, or by calling
//! [`LifecycleCoordinator::pause`] and [`LifecycleCoordinator::resume`]
//! directly.
//!
//! - Pause sets the process paused flag and drops the socket of every pooled
//!   channel. Channels stay pooled and keep wanting to reconnect.
//! - Resume clears the flag, reconnects every pooled channel that still
//!   wants to, and removes the rest from the pool.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use super::core::ConduitShared;

// ============================================================================
// Types
// ============================================================================

/// Zero-argument lifecycle notification callback.
pub type LifecycleCallback = Box<dyn Fn() + Send + Sync>;

/// Source of application pause/resume notifications.
pub trait LifecycleHooks {
    /// Registers `callback` to run when the application pauses.
    fn on_application_pause(&self, callback: LifecycleCallback);

    /// Registers `callback` to run when the application resumes.
    fn on_application_resume(&self, callback: LifecycleCallback);
}

// ============================================================================
// LifecycleCoordinator
// ============================================================================

/// Drives pool-wide suspension and reconnection.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    conduit: Arc<ConduitShared>,
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("paused", &self.is_paused())
            .finish()
    }
}

impl LifecycleCoordinator {
    pub(crate) fn new(conduit: Arc<ConduitShared>) -> Self {
        Self { conduit }
    }

    /// Returns `true` while the application is paused.
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.conduit.is_paused()
    }

    /// Handles an application pause.
    ///
    /// Returns the number of channels suspended.
    pub fn pause(&self) -> usize {
        pause(&self.conduit)
    }

    /// Handles an application resume.
    ///
    /// Returns the number of channels a reconnect was requested for.
    pub fn resume(&self) -> usize {
        resume(&self.conduit)
    }

    /// Registers pause and resume callbacks with `hooks`.
    ///
    /// The callbacks hold the conduit weakly and do nothing once it is gone.
    pub fn attach(&self, hooks: &dyn LifecycleHooks) {
        let conduit = Arc::downgrade(&self.conduit);
        hooks.on_application_pause(Box::new(move || {
            if let Some(conduit) = Weak::upgrade(&conduit) {
                pause(&conduit);
            }
        }));

        let conduit = Arc::downgrade(&self.conduit);
        hooks.on_application_resume(Box::new(move || {
            if let Some(conduit) = Weak::upgrade(&conduit) {
                resume(&conduit);
            }
        }));

        debug!("Lifecycle hooks attached");
    }
}

fn pause(conduit: &ConduitShared) -> usize {
    conduit.paused.store(true, Ordering::Release);
    info!("Application paused");
    conduit.pool.suspend_all()
}

fn resume(conduit: &ConduitShared) -> usize {
    conduit.paused.store(false, Ordering::Release);
    info!("Application resumed");
    conduit.pool.resume_all(conduit.config.reconnect)
}

// ============================================================================
// Tests
// ============================================================================
