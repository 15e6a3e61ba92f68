//! Topic names shared by the handcrafted stages.

/// Raw external input for the turn.
pub const GEN_USER_UTTERANCE: &str = "gen_user_utterance";
/// The utterance, forwarded once a domain is selected.
pub const USER_UTTERANCE: &str = "user_utterance";
/// The selected domain id.
pub const DOMAIN: &str = "domain";
/// A message from the domain tracker itself (greeting, clarification).
pub const SYS_NOTICE: &str = "sys_notice";
/// Ends the session when set.
pub const DIALOG_END: &str = "dialog_end";
/// Parsed user acts.
pub const USER_ACTS: &str = "user_acts";
/// Accumulated user goal.
pub const BELIEFSTATE: &str = "beliefstate";
/// The system's chosen act.
pub const SYS_ACT: &str = "sys_act";
/// The system's reply text.
pub const SYS_UTTERANCE: &str = "sys_utterance";
/// Predicted backchannel for the next system turn.
pub const PREDICTED_BC: &str = "predicted_bc";
