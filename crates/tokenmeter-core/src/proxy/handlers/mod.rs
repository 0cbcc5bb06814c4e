// Handlers module - API endpoint handlers

pub mod anthropic;
pub mod common;
pub mod gemini;
pub mod openai;

pub use anthropic::handle_messages;
pub use gemini::handle_generate_content;
pub use openai::handle_chat_completions;
