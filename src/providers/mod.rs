pub mod llm;

pub use llm::{LLMProvider, Message, MockLLMProvider, OpenAIProvider};
