pub mod character_llm;
pub mod gallery;
pub mod gemini;
pub mod illustrator;
pub mod outline_llm;
pub mod storage;
pub mod tts;

pub use character_llm::GeminiCharacterAdapter;
pub use gallery::GalleryDbAdapter;
pub use gemini::GeminiClient;
pub use illustrator::GeminiIllustratorAdapter;
pub use outline_llm::GeminiOutlineAdapter;
pub use storage::FsStorageAdapter;
pub use tts::ElevenLabsTtsAdapter;
