pub mod action_budget;
pub mod apply_directive;
pub mod directive_parser;
pub mod engine;
pub mod game_store;
pub mod llm_client;
pub mod protocol;
pub mod reset_clock;
pub mod slot_repository;
pub mod transcript;
pub mod turn;
