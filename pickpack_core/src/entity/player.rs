use super::Capabilities;

/// Players are driven from outside the simulation: they refuse picks and puts
/// and have no behaviour of their own.
pub(crate) struct PlayerHooks;

impl Capabilities for PlayerHooks {}
