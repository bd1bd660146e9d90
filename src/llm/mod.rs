//! LLM Client Layer - chat-completions integration
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - OpenAiClient implementation for OpenAI-compatible endpoints
//! - MockLlmClient for scripted tests
//! - Decoding of JSON-only replies

pub mod client;
pub mod openai;
pub mod structured;
pub mod types;

pub use client::{LlmClient, LlmError, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use structured::parse_structured;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
