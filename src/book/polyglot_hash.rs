use super::polyglot_keys::POLYGLOT_RANDOMS;
use crate::board::castle_bits::{CASTLE_BK, CASTLE_BQ, CASTLE_WK, CASTLE_WQ};
use crate::board::{Board, Color};
use crate::square::Square;

/// Book-format position hash. The layout follows the polyglot convention
/// (piece-square keys first, then castling, en-passant file, and a turn key
/// XORed when White is to move) over this crate's key schedule.
pub fn compute_book_hash(board: &Board) -> u64 {
    let mut hash: u64 = 0;

    for sq_idx in 0..64u8 {
        if let Some((color, piece)) = board.piece_at(Square::from_index(sq_idx)) {
            // Book piece kinds interleave colors: black pawn 0, white pawn 1, ...
            let color_offset = if color == Color::White { 1 } else { 0 };
            let piece_kind = (piece as usize) * 2 + color_offset;
            hash ^= POLYGLOT_RANDOMS[64 * piece_kind + sq_idx as usize];
        }
    }

    let rights = board.castling_rights;
    if rights & CASTLE_WK != 0 {
        hash ^= POLYGLOT_RANDOMS[768];
    }
    if rights & CASTLE_WQ != 0 {
        hash ^= POLYGLOT_RANDOMS[769];
    }
    if rights & CASTLE_BK != 0 {
        hash ^= POLYGLOT_RANDOMS[770];
    }
    if rights & CASTLE_BQ != 0 {
        hash ^= POLYGLOT_RANDOMS[771];
    }

    // The board only records a capturable en-passant square, which matches
    // the book rule exactly.
    if let Some(ep_sq) = board.en_passant {
        hash ^= POLYGLOT_RANDOMS[772 + ep_sq.file() as usize];
    }

    if board.side_to_move == Color::White {
        hash ^= POLYGLOT_RANDOMS[780];
    }

    hash
}
