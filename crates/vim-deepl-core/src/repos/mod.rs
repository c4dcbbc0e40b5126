//! Repositories - typed accessors per table family; SQL never leaves this module

pub mod bookmarks;
pub mod definitions;
pub mod trainer;
pub mod translations;

pub use bookmarks::{BookMark, BookmarksRepo};
pub use definitions::{DefinitionSet, DefinitionsRepo};
pub use trainer::{CardCandidate, DeckStats, SrsUpdate, TrainerRepo, TrainingCard, TrainingEntry};
pub use translations::{CtxEntry, Entry, TranslationRepo, TranslationVariant};
