//! Piece registry

use crate::types::Piece;
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage for pieces, injected into the request handlers.
pub trait PieceStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Piece>;

    /// Insert or replace a piece
    fn put(&self, piece: Piece);

    /// All pieces, oldest upload first
    fn list(&self) -> Vec<Piece>;

    /// Apply `f` to a stored piece atomically and return the updated copy
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Piece)) -> Option<Piece>;
}

/// Process-lifetime in-memory store
#[derive(Default)]
pub struct InMemoryPieceStore {
    pieces: RwLock<HashMap<String, Piece>>,
}

impl InMemoryPieceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PieceStore for InMemoryPieceStore {
    fn get(&self, id: &str) -> Option<Piece> {
        self.pieces.read().ok()?.get(id).cloned()
    }

    fn put(&self, piece: Piece) {
        if let Ok(mut pieces) = self.pieces.write() {
            pieces.insert(piece.id.clone(), piece);
        }
    }

    fn list(&self) -> Vec<Piece> {
        let mut pieces: Vec<Piece> = match self.pieces.read() {
            Ok(p) => p.values().cloned().collect(),
            Err(_) => return Vec::new(),
        };
        pieces.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then_with(|| a.id.cmp(&b.id)));
        pieces
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Piece)) -> Option<Piece> {
        let mut pieces = self.pieces.write().ok()?;
        let piece = pieces.get_mut(id)?;
        f(piece);
        Some(piece.clone())
    }
}
