//! Command application logic.

use crate::command::KvCommand;
use crate::types::ClusterEntry;
use openraft::{EntryPayload, StoredMembership};

use super::state::KvState;
use super::types::KvResponse;

/// Apply a command to the key-value state.
pub fn apply_command(state: &mut KvState, cmd: KvCommand) -> KvResponse {
    match cmd {
        KvCommand::Set { key, value } => KvResponse::previous(state.data.insert(key, value)),
        KvCommand::Delete { key } => KvResponse::previous(state.data.remove(&key)),
    }
}

/// Apply one committed log entry, advancing the applied log id.
pub fn apply_entry(state: &mut KvState, entry: ClusterEntry) -> KvResponse {
    tracing::debug!(%entry.log_id, "applying to state machine");

    state.last_applied_log = Some(entry.log_id);

    match entry.payload {
        EntryPayload::Blank => KvResponse::none(),
        EntryPayload::Normal(cmd) => apply_command(state, cmd),
        EntryPayload::Membership(membership) => {
            state.last_membership = StoredMembership::new(Some(entry.log_id), membership);
            KvResponse::none()
        }
    }
}
