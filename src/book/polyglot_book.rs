use rand::Rng;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::info;

use super::polyglot_entry::PolyglotEntry;
use super::polyglot_hash::compute_book_hash;
use crate::board::Board;
use crate::moves::types::Move;

/// An opening book of key-sorted 16-byte records.
pub struct PolyglotBook {
    entries: Vec<PolyglotEntry>,
}

impl PolyglotBook {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let f = File::open(path.as_ref())?;
        let mut reader = BufReader::new(f);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        let count = buffer.len() / 16;
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let record: &[u8; 16] = buffer[i * 16..i * 16 + 16]
                .try_into()
                .expect("chunk is 16 bytes");
            entries.push(PolyglotEntry::from_bytes(record));
        }

        info!(path = %path.as_ref().display(), entries = entries.len(), "opening book loaded");
        Ok(Self { entries })
    }

    pub fn from_entries(mut entries: Vec<PolyglotEntry>) -> Self {
        entries.sort_by_key(|e| e.key);
        Self { entries }
    }

    /// A move for this position, chosen weighted-random among all matching
    /// records. None when the position is out of book.
    pub fn probe(&self, board: &Board) -> Option<Move> {
        let hash = compute_book_hash(board);

        let idx = self.entries.partition_point(|e| e.key < hash);
        if idx >= self.entries.len() || self.entries[idx].key != hash {
            return None;
        }

        let mut candidates = Vec::new();
        let mut i = idx;
        while i < self.entries.len() && self.entries[i].key == hash {
            candidates.push(&self.entries[i]);
            i += 1;
        }

        let total_weight: u32 = candidates.iter().map(|e| e.weight as u32).sum();
        if total_weight == 0 {
            // All weights zero: take the first decodable entry.
            return candidates.iter().find_map(|e| e.decode_move(board));
        }

        let mut rng = rand::rng();
        let mut pick = rng.random_range(0..total_weight);
        for entry in candidates {
            let w = entry.weight as u32;
            if pick < w {
                return entry.decode_move(board);
            }
            pick -= w;
        }

        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::square::Square;
    use std::str::FromStr;

    fn encode(from: &str, to: &str) -> u16 {
        let from = Square::from_str(from).unwrap();
        let to = Square::from_str(to).unwrap();
        ((from.rank() as u16) << 9)
            | ((from.file() as u16) << 6)
            | ((to.rank() as u16) << 3)
            | to.file() as u16
    }

    #[test]
    fn probe_finds_a_matching_entry() {
        let board = Board::new();
        let key = compute_book_hash(&board);

        let book = PolyglotBook::from_entries(vec![
            PolyglotEntry {
                key: key ^ 1,
                move_poly: encode("a2", "a3"),
                weight: 10,
                learn: 0,
            },
            PolyglotEntry {
                key,
                move_poly: encode("e2", "e4"),
                weight: 10,
                learn: 0,
            },
        ]);

        let mv = book.probe(&board).unwrap();
        assert_eq!(mv.to_uci(), "e2e4");
    }

    #[test]
    fn probe_misses_out_of_book_positions() {
        let board = Board::new();
        let book = PolyglotBook::from_entries(vec![PolyglotEntry {
            key: 0x42,
            move_poly: encode("e2", "e4"),
            weight: 1,
            learn: 0,
        }]);
        assert!(book.probe(&board).is_none());
    }

    #[test]
    fn weighted_choice_only_returns_book_moves() {
        let board = Board::new();
        let key = compute_book_hash(&board);
        let book = PolyglotBook::from_entries(vec![
            PolyglotEntry {
                key,
                move_poly: encode("e2", "e4"),
                weight: 3,
                learn: 0,
            },
            PolyglotEntry {
                key,
                move_poly: encode("d2", "d4"),
                weight: 1,
                learn: 0,
            },
        ]);

        for _ in 0..32 {
            let mv = book.probe(&board).unwrap().to_uci();
            assert!(mv == "e2e4" || mv == "d2d4");
        }
    }
}
