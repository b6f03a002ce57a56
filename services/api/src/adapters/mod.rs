pub mod db;
pub mod deepseek;
pub mod gemini;
mod http;
pub mod memory_store;
pub mod openai_chat;
pub mod parsing;
pub mod pdf;
pub mod prompt;

pub use db::PgActivityStore;
pub use deepseek::DeepSeekAdapter;
pub use gemini::GeminiAdapter;
pub use memory_store::InMemoryActivityStore;
pub use openai_chat::OpenAiChatAdapter;
pub use pdf::PdfOxideExtractor;
