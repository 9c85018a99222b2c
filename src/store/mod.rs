//! Embedding store - read-only card table loaded once per process
//!
//! Public interface:
//! - `Card` (id, content, embedding)
//! - `EmbeddingStore` opened from a SQLite file or built from fixture cards
//! - blob codec for little-endian packed f32 embeddings
//!
//! The store is immutable after load and is shared by reference between
//! concurrent invocations without locking.

mod sqlite;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub use sqlite::DEFAULT_TABLE;

/// A single flashcard with its precomputed embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

impl Card {
    pub fn new(id: i64, content: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id,
            content: content.into(),
            embedding,
        }
    }
}

/// All cards of one deck-scale corpus, in ascending id order
#[derive(Debug)]
pub struct EmbeddingStore {
    path: Option<PathBuf>,
    cards: Vec<Card>,
    dimension: usize,
}

impl EmbeddingStore {
    /// Open a store file using the default table name
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_table(path, DEFAULT_TABLE)
    }

    /// Open a store file reading cards from `table`
    ///
    /// Fails with `StoreNotFound` if the file is missing and `StoreFormat` if
    /// the table, its columns or the embedding blobs are unusable.
    pub fn open_table<P: AsRef<Path>>(path: P, table: &str) -> Result<Self> {
        let path = path.as_ref();
        let cards = sqlite::read_cards(path, table)?;
        let store = Self::validated(Some(path.to_path_buf()), cards)?;
        tracing::info!(
            path = %path.display(),
            cards = store.len(),
            dimension = store.dimension(),
            "loaded embedding store"
        );
        Ok(store)
    }

    /// Build a store from in-memory cards (fixtures, tests)
    pub fn from_cards(cards: Vec<Card>) -> Result<Self> {
        Self::validated(None, cards)
    }

    fn validated(path: Option<PathBuf>, mut cards: Vec<Card>) -> Result<Self> {
        let origin = path
            .clone()
            .unwrap_or_else(|| PathBuf::from("<memory>"));

        let dimension = cards.first().map(|c| c.embedding.len()).unwrap_or(0);
        if !cards.is_empty() && dimension == 0 {
            return Err(Error::store_format(&origin, "embeddings are empty"));
        }

        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if card.embedding.len() != dimension {
                return Err(Error::store_format(
                    &origin,
                    format!(
                        "card {} has a {}-dimensional embedding, expected {}",
                        card.id,
                        card.embedding.len(),
                        dimension
                    ),
                ));
            }
            if !seen.insert(card.id) {
                return Err(Error::store_format(
                    &origin,
                    format!("duplicate card id {}", card.id),
                ));
            }
        }

        cards.sort_by_key(|c| c.id);
        Ok(Self {
            path,
            cards,
            dimension,
        })
    }

    /// Source file, if the store was loaded from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Embedding dimension shared by every card (0 for an empty store)
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Look up a card by id
    pub fn get(&self, id: i64) -> Option<&Card> {
        self.cards
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.cards[i])
    }
}

/// Pack an embedding as little-endian f32 bytes (store blob format)
pub fn vec_f32_to_bytes(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Unpack a little-endian f32 blob; `None` if the length is not a multiple of 4
pub fn bytes_to_vec_f32(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}
