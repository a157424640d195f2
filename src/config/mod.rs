//! Configuration module for Spør.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, QaPrompts};
pub use settings::{
    CompletionSettings, EmbeddingSettings, GeneralSettings, PromptSettings, RetrievalSettings,
    SemanticIndexProvider, SemanticIndexSettings, ServerSettings, Settings, StorageSettings,
};
