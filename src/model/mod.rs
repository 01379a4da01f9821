pub mod action_budget;
pub mod directive;
pub mod event_result;
pub mod game_save;
pub mod game_state;
pub mod message;
pub mod scenario;
