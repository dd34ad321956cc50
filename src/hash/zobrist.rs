use crate::board::castle_bits::CastleBits;
use crate::board::{Color, Piece};
use once_cell::sync::OnceCell;
use rand::{RngCore, SeedableRng, rngs::StdRng};

// One flat slab of keys: 768 piece-square entries, then the four castle
// rights (K, Q, k, q), then the eight en-passant files, then the side key.
const PIECE_KEYS: usize = 2 * 6 * 64;
const CASTLE_BASE: usize = PIECE_KEYS;
const EP_BASE: usize = CASTLE_BASE + 4;
const SIDE_KEY: usize = EP_BASE + 8;
const KEY_COUNT: usize = SIDE_KEY + 1;

/// The position hash keys, stored as a single table with typed accessors.
///
/// Every entry is drawn non-zero: a full-position key of 0 is reserved as
/// the "unhashable" marker used by null-move search, and keeping the
/// individual keys away from 0 makes an accidental collision with that
/// marker vanishingly rare (and harmless, the search just skips the
/// transposition store for such a node).
pub struct ZobristKeys {
    table: [u64; KEY_COUNT],
}

impl ZobristKeys {
    fn generate(mut rng: StdRng) -> Self {
        let mut table = [0u64; KEY_COUNT];
        for slot in table.iter_mut() {
            let mut key = rng.next_u64();
            while key == 0 {
                key = rng.next_u64();
            }
            *slot = key;
        }
        ZobristKeys { table }
    }

    /// Key for `piece` of `color` standing on `square`.
    #[inline(always)]
    pub fn piece(&self, color: Color, piece: Piece, square: usize) -> u64 {
        debug_assert!(square < 64);
        self.table[((color as usize * 6 + piece as usize) << 6) | square]
    }

    /// XOR mask that moves the hash from one castling-rights set to
    /// another. Passing `0` as either side hashes a set in or out whole.
    #[inline]
    pub fn castle_delta(&self, old: CastleBits, new: CastleBits) -> u64 {
        let mut delta = 0;
        let mut changed = old ^ new;
        while changed != 0 {
            let bit = changed.trailing_zeros() as usize;
            delta ^= self.table[CASTLE_BASE + bit];
            changed &= changed - 1;
        }
        delta
    }

    /// Key for a live en-passant file (a..h = 0..7).
    #[inline(always)]
    pub fn ep_file(&self, file: u8) -> u64 {
        debug_assert!(file < 8);
        self.table[EP_BASE + file as usize]
    }

    /// Key XORed in when Black is to move.
    #[inline(always)]
    pub fn side_to_move(&self) -> u64 {
        self.table[SIDE_KEY]
    }
}

fn key_rng() -> StdRng {
    #[cfg(feature = "deterministic_zobrist")]
    {
        StdRng::seed_from_u64(0xB5AD_4ECE_DA1C_E2A9)
    }
    #[cfg(not(feature = "deterministic_zobrist"))]
    {
        StdRng::from_os_rng()
    }
}

/// Global keys, initialized on first use.
pub fn zobrist_keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| ZobristKeys::generate(key_rng()))
}
