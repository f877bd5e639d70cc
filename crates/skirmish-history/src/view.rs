//! Access-checked read views over the action log

use crate::error::{Error, Result};
use skirmish_core::{ActionEntry, BattleState, HistoryQuery, UserId};

/// Query a battle's action history, newest first.
///
/// Only battle participants (or the system user) may read the log.
pub fn battle_action_history<'a>(
    state: &'a BattleState,
    caller: &UserId,
    query: &HistoryQuery,
) -> Result<Vec<&'a ActionEntry>> {
    if !caller.is_system() && state.army_of_user(caller).is_none() {
        return Err(Error::Engine(skirmish_core::Error::EntityNotFound(
            caller.to_string(),
        )));
    }
    Ok(state.history.query(query))
}
