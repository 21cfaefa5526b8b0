// src/poligen/mod.rs

pub mod agent;
pub mod bridge;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod event;
pub mod group_chat;
pub mod human_io;
pub mod llm_session;
pub mod prompts;
pub mod session;

pub use llm_session::LLMSession;
