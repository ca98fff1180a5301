//! Host control API access.
//!
//! The host exposes its conduit listener through a handful of
//! request/response methods on the RPC layer. This module defines the
//! seam to that layer ([`ControlApi`]) and the typed operations built on it
//! ([`ControlFacade`]).
//!
//! # Methods
//!
//! | Method | Reply |
//! |--------|-------|
//! | `internal.conduit.start` | `{ port }` |
//! | `internal.conduit.stop` | none |
//! | `internal.conduit.status` | `{ port, isActive, sharedKey }` |
//! | `internal.conduit.getSharedKey` | `{ sharedKey }` |
//! | `internal.conduit.setSharedKey` | `{ sharedKey }` |
//! | `diagnostics.query` | `{ conduit: { isActive, handles: { ids, count } } }` |

// ============================================================================
// Submodules
// ============================================================================

/// Control API trait and command set.
pub mod api;

/// Typed control operations.
pub mod facade;

/// Control reply types.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ControlApi, ControlCommand};
pub use facade::{ControlFacade, DEFAULT_STATUS_POLL_INTERVAL};
pub use types::{ConduitDiagnostics, ConduitStatus, HandleDiagnostics, StartReply};
