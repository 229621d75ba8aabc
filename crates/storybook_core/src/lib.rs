pub mod domain;
pub mod ports;
pub mod session;

pub use domain::{
    AudioClip, Character, CharacterAnalysis, NewPublicStory, PageCharacters, PageStub,
    PublicStory, StoredImage, StoryPage,
};
pub use ports::{
    CharacterAnalysisService, GalleryService, IllustrationService, OutlineService, PortError,
    PortResult, StorageService, TextToSpeechService,
};
pub use session::{SessionError, StorySession, WizardStage};
