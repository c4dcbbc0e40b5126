//! # vim-deepl core
//!
//! Personal vocabulary engine sitting between a text editor and two upstream
//! dictionary providers:
//!
//! - **Two-tier translation cache**: base cache keyed by `(term, src, dst)`,
//!   contextual cache keyed additionally by a hash of the surrounding sentence
//! - **Dictionary metadata**: Merriam-Webster definitions grouped by part of
//!   speech, with pronunciation audio identifiers and lazy backfill
//! - **SM-2 trainer**: due/new/hard candidate pools, ease-factor and interval
//!   updates, per-day review accounting and streaks
//! - **Audio pipeline**: single-worker playback with cancellation tokens and
//!   decoupled best-effort prefetch
//! - **Bookmarks**: file-fingerprint-addressed reading highlights that
//!   survive renames and moves
//!
//! Everything persists to one SQLite database in WAL mode. The HTTP façade
//! lives in the `vim-deepl-server` crate; this crate is transport-agnostic.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vim_deepl_core::{Config, Services};
//!
//! let cfg = Config::from_env()?;
//! let services = Services::new(&cfg)?;
//!
//! let result = services
//!     .translation
//!     .translate_word("apple", Some("RU"), "EN", None)
//!     .await?;
//! ```

// ============================================================================
// MODULES
// ============================================================================

pub mod audio;
pub mod config;
pub mod error;
pub mod providers;
pub mod repos;
pub mod services;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{Config, ConfigError, TrainerConfig};
pub use error::{AppError, Result};

pub use storage::{Database, StorageError};

pub use repos::{
    BookMark, CtxEntry, DeckStats, DefinitionSet, Entry, TrainingCard, TranslationVariant,
};

pub use providers::{DictionaryProvider, Translation, Translator};

pub use services::{
    BookmarksService, DefinitionsService, Progress, SelectionResult, Services, TrainerItem,
    TrainerService, TranslationService, WordResult,
};

pub use audio::{AudioCache, AudioWorker, Prefetcher, audio_subdir, audio_url};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
