//! Provider implementations for TaskHelm.
//!
//! One implementation covers the vast majority of backends: any service
//! exposing an OpenAI-compatible `/v1/chat/completions` and `/v1/embeddings`
//! endpoint (OpenAI, Azure-style proxies, OpenRouter, Ollama, vLLM, …).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
