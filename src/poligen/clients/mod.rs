//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! The participants only need OpenAI compatible chat completions, so a single
//! provider lives here next to the shared HTTP plumbing.

pub mod common;

pub mod openai;
