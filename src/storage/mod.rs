mod json_file;
mod repository;

pub use json_file::*;
pub use repository::*;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::domain::AppState;

/// SQL migration for the slot table
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Slot name used when none is configured.
pub const DEFAULT_SLOT: &str = "debtbook_data";

/// Where the ledger document is kept between runs.
#[derive(Debug, Clone)]
pub enum Backend {
    /// A named slot in a SQLite database.
    Sqlite { repo: Repository, slot: String },
    /// A plain JSON file; the file itself is the slot.
    JsonFile(JsonFileStore),
}

impl Backend {
    /// Open (creating if needed) a SQLite database and use `slot` within it.
    pub async fn sqlite(path: &str, slot: impl Into<String>) -> Result<Self> {
        let repo = Repository::init(path).await?;
        Ok(Backend::Sqlite {
            repo,
            slot: slot.into(),
        })
    }

    pub fn json_file(path: impl Into<std::path::PathBuf>) -> Self {
        Backend::JsonFile(JsonFileStore::new(path))
    }

    /// Read the raw stored document, if any.
    pub async fn load_raw(&self) -> Result<Option<String>> {
        match self {
            Backend::Sqlite { repo, slot } => repo.load_slot(slot).await,
            Backend::JsonFile(store) => store.load().await,
        }
    }

    pub async fn save_raw(&self, contents: &str) -> Result<()> {
        match self {
            Backend::Sqlite { repo, slot } => repo.save_slot(slot, contents).await,
            Backend::JsonFile(store) => store.save(contents).await,
        }
    }

    /// Load the stored ledger.
    ///
    /// A missing document yields the default state. So does a document that
    /// cannot be parsed; that case is logged and never fails startup.
    pub async fn load_state(&self) -> Result<AppState> {
        let raw = self.load_raw().await?;
        Ok(match raw {
            Some(contents) => decode_state(&contents),
            None => {
                debug!("no stored ledger found, starting empty");
                AppState::default()
            }
        })
    }

    /// Serialize and store the whole ledger.
    pub async fn save_state(&self, state: &AppState) -> Result<()> {
        let contents = encode_state(state)?;
        self.save_raw(&contents).await
    }
}

/// Serialize a ledger into the persisted document.
pub fn encode_state(state: &AppState) -> Result<String> {
    serde_json::to_string(state).context("Failed to serialize ledger")
}

/// Parse a persisted document, falling back to the default ledger when the
/// contents are corrupt.
pub fn decode_state(contents: &str) -> AppState {
    match serde_json::from_str(contents) {
        Ok(state) => state,
        Err(e) => {
            warn!(error = %e, "failed to parse stored ledger, starting from an empty one");
            AppState::default()
        }
    }
}
