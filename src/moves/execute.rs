use crate::board::castle_bits::*;
use crate::board::{Board, Color, EMPTY_SQ, Piece};
use crate::hash::zobrist::zobrist_keys;
use crate::moves::magic::MagicTables;
use crate::moves::movegen::generate_pseudo_legal;
use crate::moves::square_control::{FILE_A, FILE_H, in_check, is_legal_castling};
use crate::moves::types::{Move, MoveList, NullMoveUndo, Undo};
use crate::nnue::NnueNetwork;
use crate::square::Square;

/// Castling rook relocation, keyed by king destination index.
#[inline(always)]
fn rook_castle_squares(king_to_idx: u8) -> Option<(Square, Square)> {
    match king_to_idx {
        6 => Some((Square::from_index(7), Square::from_index(5))), // White O-O
        2 => Some((Square::from_index(0), Square::from_index(3))), // White O-O-O
        62 => Some((Square::from_index(63), Square::from_index(61))), // Black O-O
        58 => Some((Square::from_index(56), Square::from_index(59))), // Black O-O-O
        _ => None,
    }
}

#[inline(always)]
fn rights_mask_to_clear_for_rook(color: Color, rook_sq: u8) -> u8 {
    match (color, rook_sq) {
        (Color::White, 0) => CASTLE_WQ,  // a1
        (Color::White, 7) => CASTLE_WK,  // h1
        (Color::Black, 56) => CASTLE_BQ, // a8
        (Color::Black, 63) => CASTLE_BK, // h8
        _ => 0,
    }
}

/// Clear one piece bit, keeping the square table, zobrist key and material
/// counter in sync.
#[inline(always)]
fn remove_piece(board: &mut Board, color: Color, piece: Piece, idx: usize) {
    let new_bb = board.bb(color, piece) & !(1u64 << idx);
    board.set_bb(color, piece, new_bb);
    if piece != Piece::King {
        board.material[color as usize] -= piece.value();
    }
}

/// Set one piece bit, keeping the square table, zobrist key and material
/// counter in sync.
#[inline(always)]
fn place_piece(board: &mut Board, color: Color, piece: Piece, idx: usize) {
    let new_bb = board.bb(color, piece) | (1u64 << idx);
    board.set_bb(color, piece, new_bb);
    if piece != Piece::King {
        board.material[color as usize] += piece.value();
    }
}

#[inline(always)]
fn classify(board: &Board, mv: Move, piece: Piece) -> (bool, bool, bool) {
    let from = mv.from();
    let to = mv.to();
    let is_ep =
        piece == Piece::Pawn && board.en_passant == Some(to) && from.file() != to.file();
    let is_castle = piece == Piece::King && from.file().abs_diff(to.file()) == 2;
    let is_double_push = piece == Piece::Pawn && from.rank().abs_diff(to.rank()) == 2;
    (is_ep, is_castle, is_double_push)
}

/// Apply a pseudo-legal move. The position, its zobrist key, material
/// counters and both NNUE accumulators change together; `unmake_move` with
/// the returned record is an exact inverse.
pub fn make_move(board: &mut Board, mv: Move, net: &NnueNetwork) -> Undo {
    let keys = zobrist_keys();
    let color = board.side_to_move;
    let from_idx = mv.from().index() as usize;
    let to_idx = mv.to().index() as usize;

    debug_assert!(board.piece_on_sq[from_idx] != EMPTY_SQ, "empty from-square");
    let piece = Piece::from_u8(board.piece_on_sq[from_idx] & 0b111);
    let (is_ep, is_castle, is_double_push) = classify(board, mv, piece);

    // Accumulator snapshot first: every later change is incremental.
    board.acc_stack.push(board.accumulator.clone());

    let prev_en_passant = board.en_passant;
    let prev_halfmove_clock = board.halfmove_clock;
    let prev_fullmove_number = board.fullmove_number;

    // XOR the old en-passant file out of the hash before any state changes.
    if let Some(f) = board.ep_hash_file() {
        board.zobrist ^= keys.ep_file(f);
    }
    board.en_passant = None;

    // Capture (including en passant, whose victim is not on the to-square).
    let mut capture = None;
    if is_ep {
        let cap_sq = if color == Color::White {
            to_idx - 8
        } else {
            to_idx + 8
        };
        capture = Some((
            color.opposite(),
            Piece::Pawn,
            Square::from_index(cap_sq as u8),
        ));
        remove_piece(board, color.opposite(), Piece::Pawn, cap_sq);
        board
            .accumulator
            .remove_piece(net, color.opposite(), Piece::Pawn, cap_sq);
    } else {
        let occupant = board.piece_on_sq[to_idx];
        if occupant != EMPTY_SQ {
            let cap_color = Color::from_u8(occupant >> 3);
            let cap_piece = Piece::from_u8(occupant & 0b111);
            capture = Some((cap_color, cap_piece, mv.to()));
            remove_piece(board, cap_color, cap_piece, to_idx);
            board
                .accumulator
                .remove_piece(net, cap_color, cap_piece, to_idx);
        }
    }

    let undo = Undo {
        mv,
        piece,
        color,
        capture,
        castling_rook: if is_castle {
            rook_castle_squares(to_idx as u8)
        } else {
            None
        },
        prev_castling_rights: board.castling_rights,
        promotion: mv.promotion(),
        prev_en_passant,
        prev_halfmove_clock,
        prev_fullmove_number,
        prev_last_reset: board.last_reset,
        prev_repetitions: board.repetitions,
        prev_last_move: board.last_move,
    };

    // Castle rights to clear: king moved, rook left a corner, or a rook was
    // captured on its corner.
    let old_rights = board.castling_rights;
    let mut mask_to_clear: u8 = 0;
    if piece == Piece::King {
        mask_to_clear |= match color {
            Color::White => CASTLE_WK | CASTLE_WQ,
            Color::Black => CASTLE_BK | CASTLE_BQ,
        };
    }
    if piece == Piece::Rook {
        mask_to_clear |= rights_mask_to_clear_for_rook(color, mv.from().index());
    }
    if let Some((cap_color, cap_piece, cap_sq)) = capture
        && cap_piece == Piece::Rook
    {
        mask_to_clear |= rights_mask_to_clear_for_rook(cap_color, cap_sq.index());
    }
    let new_rights = old_rights & !mask_to_clear;
    if new_rights != old_rights {
        board.castling_rights = new_rights;
        board.zobrist ^= keys.castle_delta(old_rights, new_rights);
    }

    // Move the piece, promoting if requested.
    remove_piece(board, color, piece, from_idx);
    board.accumulator.remove_piece(net, color, piece, from_idx);

    let placed = match mv.promotion() {
        Some(prom) => {
            debug_assert!(piece == Piece::Pawn, "only pawns promote");
            prom
        }
        None => piece,
    };
    place_piece(board, color, placed, to_idx);
    board.accumulator.add_piece(net, color, placed, to_idx);

    // Castling moves the rook as well.
    if let Some((rook_from, rook_to)) = undo.castling_rook {
        let rf = rook_from.index() as usize;
        let rt = rook_to.index() as usize;
        remove_piece(board, color, Piece::Rook, rf);
        board.accumulator.remove_piece(net, color, Piece::Rook, rf);
        place_piece(board, color, Piece::Rook, rt);
        board.accumulator.add_piece(net, color, Piece::Rook, rt);
    }

    // New en-passant square: only a double push observed by an enemy pawn
    // on the landing rank creates one.
    if is_double_push {
        let to_bb = 1u64 << to_idx;
        let adjacent = ((to_bb & !FILE_A) >> 1) | ((to_bb & !FILE_H) << 1);
        if adjacent & board.pieces(Piece::Pawn, color.opposite()) != 0 {
            let ep_sq = if color == Color::White {
                from_idx + 8
            } else {
                from_idx - 8
            };
            board.en_passant = Some(Square::from_index(ep_sq as u8));
        }
    }

    if capture.is_some() || piece == Piece::Pawn {
        board.halfmove_clock = 0;
    } else {
        board.halfmove_clock = prev_halfmove_clock + 1;
    }
    if color == Color::Black {
        board.fullmove_number = prev_fullmove_number + 1;
    }

    board.side_to_move = color.opposite();
    board.zobrist ^= keys.side_to_move();

    if let Some(f) = board.ep_hash_file() {
        board.zobrist ^= keys.ep_file(f);
    }

    // Repetition bookkeeping: a capture or pawn move makes every earlier
    // position unreachable, otherwise scan same-side ancestors back to the
    // last reset.
    board.history.push(board.zobrist);
    let current = board.history.len() - 1;
    if capture.is_some() || piece == Piece::Pawn {
        board.last_reset = current;
        board.repetitions = 1;
    } else {
        let mut reps = 1u8;
        let mut i = current as isize - 2;
        while i >= board.last_reset as isize {
            if board.history[i as usize] == board.zobrist {
                reps += 1;
                if reps >= 3 {
                    break;
                }
            }
            i -= 2;
        }
        board.repetitions = reps;
    }

    board.last_move = mv;

    undo
}

/// Exact inverse of `make_move`.
pub fn unmake_move(board: &mut Board, undo: Undo) {
    let keys = zobrist_keys();

    // The pre-move accumulators were snapshotted; restoring them undoes all
    // incremental feature updates at once.
    if let Some(acc) = board.acc_stack.pop() {
        board.accumulator = acc;
    } else {
        debug_assert!(false, "unmake without matching make");
    }

    // XOR the current en-passant file out before any state is rewound.
    if let Some(f) = board.ep_hash_file() {
        board.zobrist ^= keys.ep_file(f);
    }

    board.side_to_move = undo.color;
    board.zobrist ^= keys.side_to_move();

    let cur_rights = board.castling_rights;
    if cur_rights != undo.prev_castling_rights {
        board.zobrist ^= keys.castle_delta(cur_rights, undo.prev_castling_rights);
        board.castling_rights = undo.prev_castling_rights;
    }

    board.halfmove_clock = undo.prev_halfmove_clock;
    board.fullmove_number = undo.prev_fullmove_number;

    let from_idx = undo.mv.from().index() as usize;
    let to_idx = undo.mv.to().index() as usize;

    if let Some(prom) = undo.promotion {
        remove_piece(board, undo.color, prom, to_idx);
        place_piece(board, undo.color, Piece::Pawn, from_idx);
    } else {
        remove_piece(board, undo.color, undo.piece, to_idx);
        place_piece(board, undo.color, undo.piece, from_idx);
    }

    if let Some((cap_color, cap_piece, cap_sq)) = undo.capture {
        place_piece(board, cap_color, cap_piece, cap_sq.index() as usize);
    }

    if let Some((rook_from, rook_to)) = undo.castling_rook {
        remove_piece(board, undo.color, Piece::Rook, rook_to.index() as usize);
        place_piece(board, undo.color, Piece::Rook, rook_from.index() as usize);
    }

    board.en_passant = undo.prev_en_passant;
    if let Some(f) = board.ep_hash_file() {
        board.zobrist ^= keys.ep_file(f);
    }

    board.history.pop();
    board.last_reset = undo.prev_last_reset;
    board.repetitions = undo.prev_repetitions;
    board.last_move = undo.prev_last_move;
}

/// Pass the turn. The position key is forced to 0, the reserved
/// "unhashable" marker, so nothing searched below a null move can be stored
/// in the transposition table or mistaken for a repetition.
pub fn make_null_move(board: &mut Board) -> NullMoveUndo {
    let undo = NullMoveUndo {
        prev_zobrist: board.zobrist,
        prev_en_passant: board.en_passant,
        prev_side: board.side_to_move,
    };

    board.en_passant = None;
    board.side_to_move = board.side_to_move.opposite();
    board.zobrist = 0;

    undo
}

pub fn undo_null_move(board: &mut Board, undo: NullMoveUndo) {
    board.side_to_move = undo.prev_side;
    board.en_passant = undo.prev_en_passant;
    board.zobrist = undo.prev_zobrist;
}

/// Check a pseudo-legal move for legality by applying it to the bitboards
/// only, testing whether the mover's king is attacked, and reverting.
/// Castling is delegated to the attacked-square rules instead.
///
/// The square table, hash, material and accumulators are never touched, so
/// this is safe to call at full generation frequency.
pub fn is_legal_move(board: &mut Board, mv: Move, tables: &MagicTables) -> bool {
    let color = board.side_to_move;
    let from_idx = mv.from().index() as usize;
    let to_idx = mv.to().index() as usize;

    debug_assert!(board.piece_on_sq[from_idx] != EMPTY_SQ);
    let piece = Piece::from_u8(board.piece_on_sq[from_idx] & 0b111);
    let (is_ep, is_castle, _) = classify(board, mv, piece);

    if is_castle {
        return is_legal_castling(board, mv, tables);
    }

    let captured = if is_ep {
        let cap_idx = if color == Color::White {
            to_idx - 8
        } else {
            to_idx + 8
        };
        Some((color.opposite(), Piece::Pawn, cap_idx))
    } else {
        let occupant = board.piece_on_sq[to_idx];
        if occupant != EMPTY_SQ {
            Some((
                Color::from_u8(occupant >> 3),
                Piece::from_u8(occupant & 0b111),
                to_idx,
            ))
        } else {
            None
        }
    };

    let saved_occ_white = board.occ_white;
    let saved_occ_black = board.occ_black;
    let saved_occ_all = board.occ_all;

    let move_mask = (1u64 << from_idx) | (1u64 << to_idx);
    board.piece_bb[color as usize][piece as usize] ^= move_mask;
    if let Some((cap_color, cap_piece, cap_idx)) = captured {
        board.piece_bb[cap_color as usize][cap_piece as usize] ^= 1u64 << cap_idx;
    }

    let mut occ_white = 0u64;
    let mut occ_black = 0u64;
    for pi in 0..6 {
        occ_white |= board.piece_bb[Color::White as usize][pi];
        occ_black |= board.piece_bb[Color::Black as usize][pi];
    }
    board.occ_white = occ_white;
    board.occ_black = occ_black;
    board.occ_all = occ_white | occ_black;

    let attacked = in_check(board, color, tables);

    board.piece_bb[color as usize][piece as usize] ^= move_mask;
    if let Some((cap_color, cap_piece, cap_idx)) = captured {
        board.piece_bb[cap_color as usize][cap_piece as usize] ^= 1u64 << cap_idx;
    }
    board.occ_white = saved_occ_white;
    board.occ_black = saved_occ_black;
    board.occ_all = saved_occ_all;

    !attacked
}

/// Filter the pseudo-legal list down to legal moves.
pub fn generate_legal(
    board: &mut Board,
    tables: &MagicTables,
    moves: &mut MoveList,
    scratch: &mut MoveList,
) {
    scratch.clear();
    generate_pseudo_legal(board, tables, scratch);
    moves.clear();

    for i in 0..scratch.len() {
        let mv = scratch[i];
        if is_legal_move(board, mv, tables) {
            moves.push(mv);
        }
    }
}

/// True when the side to move has no legal reply.
pub fn no_legal_moves(board: &mut Board, tables: &MagicTables) -> bool {
    let mut scratch = MoveList::new();
    generate_pseudo_legal(board, tables, &mut scratch);
    !scratch.iter().any(|&mv| is_legal_move(board, mv, tables))
}
