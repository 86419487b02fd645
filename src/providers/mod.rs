pub mod deepseek;
pub mod huggingface;
pub mod openai;
pub mod tavily;
pub mod traits;
pub mod utils;

pub use deepseek::deepseek::DeepSeekProvider;
pub use huggingface::huggingface::HuggingFaceProvider;
pub use openai::openai::OpenAIProvider;
pub use tavily::tavily::TavilyProvider;
