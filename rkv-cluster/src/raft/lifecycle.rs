//! Node lifecycle state tracking.

use crate::error::{ClusterError, ClusterResult};
use parking_lot::Mutex;
use std::fmt;

/// Where a node is in its lifecycle.
///
/// ```text
/// Unstarted -> Validated -> Resourced -> Running -> ShuttingDown -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Nothing has happened yet.
    Unstarted,
    /// Configuration passed validation.
    Validated,
    /// Listener bound and durable stores opened.
    Resourced,
    /// Consensus is running and the node serves requests.
    Running,
    /// Draining in-flight work.
    ShuttingDown,
    /// Consensus and transport have stopped.
    Stopped,
}

impl NodeState {
    /// Stable lowercase name, used in logs and status output.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Unstarted => "unstarted",
            NodeState::Validated => "validated",
            NodeState::Resourced => "resourced",
            NodeState::Running => "running",
            NodeState::ShuttingDown => "shutting_down",
            NodeState::Stopped => "stopped",
        }
    }

    /// Whether `next` directly follows this state.
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Unstarted, NodeState::Validated)
                | (NodeState::Validated, NodeState::Resourced)
                | (NodeState::Resourced, NodeState::Running)
                | (NodeState::Running, NodeState::ShuttingDown)
                | (NodeState::ShuttingDown, NodeState::Stopped)
                | (NodeState::Stopped, NodeState::Stopped)
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe holder of a node's [`NodeState`].
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<NodeState>,
}

impl Lifecycle {
    /// Start in [`NodeState::Unstarted`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NodeState::Unstarted),
        }
    }

    /// The current state.
    pub fn current(&self) -> NodeState {
        *self.state.lock()
    }

    /// Move to `next`, failing if it does not directly follow the current state.
    pub fn transition(&self, next: NodeState) -> ClusterResult<()> {
        let mut state = self.state.lock();
        let from = *state;
        if !from.can_transition_to(next) {
            return Err(ClusterError::InvalidTransition {
                from: from.as_str(),
                to: next.as_str(),
            });
        }

        tracing::debug!(%from, to = %next, "node state transition");
        *state = next;
        Ok(())
    }

    /// Enter [`NodeState::ShuttingDown`] from `Running`.
    ///
    /// Returns `false` when shutdown has already begun or finished, so the
    /// caller can treat repeated requests as no-ops.
    pub fn begin_shutdown(&self) -> bool {
        let mut state = self.state.lock();
        let from = *state;
        match from {
            NodeState::ShuttingDown | NodeState::Stopped => false,
            _ => {
                tracing::debug!(%from, "node shutting down");
                *state = NodeState::ShuttingDown;
                true
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_startup_order() {
        let lifecycle = Lifecycle::new();
        for next in [
            NodeState::Validated,
            NodeState::Resourced,
            NodeState::Running,
            NodeState::ShuttingDown,
            NodeState::Stopped,
        ] {
            lifecycle.transition(next).expect("valid transition");
        }
        assert_eq!(lifecycle.current(), NodeState::Stopped);
    }

    #[test]
    fn rejects_skipped_states() {
        let lifecycle = Lifecycle::new();
        let err = lifecycle.transition(NodeState::Running).unwrap_err();
        assert!(matches!(
            err,
            ClusterError::InvalidTransition {
                from: "unstarted",
                to: "running"
            }
        ));
        assert_eq!(lifecycle.current(), NodeState::Unstarted);
    }

    #[test]
    fn stopped_is_idempotent() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(NodeState::Validated).unwrap();
        lifecycle.transition(NodeState::Resourced).unwrap();
        lifecycle.transition(NodeState::Running).unwrap();

        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());

        lifecycle.transition(NodeState::Stopped).unwrap();
        lifecycle.transition(NodeState::Stopped).unwrap();
        assert!(!lifecycle.begin_shutdown());
    }
}
