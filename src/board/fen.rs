use super::fen_tables::{CHAR_TO_PC, PC_TO_CHAR};
use super::{Board, Color, EMPTY_SQ, Piece, castle_bits::*};
use crate::moves::pawn::pawn_attacks;
use crate::square::Square;

impl Board {
    /// Replace this board's state with the position described by `fen`.
    ///
    /// Malformed input is rejected rather than patched up: wrong rank
    /// shapes, missing kings and castle rights that do not match the
    /// king/rook placement are all errors, per the construction-time error
    /// contract.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let mut fields = fen.split_whitespace();

        let placement = fields.next().ok_or("empty FEN")?;
        let side = fields.next().ok_or("FEN missing side to move")?;
        let castling = fields.next().unwrap_or("-");
        let en_passant = fields.next().unwrap_or("-");
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut fresh = Board::new_empty();

        // Piece placement, rank 8 down to rank 1.
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(format!("FEN has {} ranks, expected 8", ranks.len()));
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let (piece, color) = CHAR_TO_PC
                        .get(c as usize)
                        .copied()
                        .flatten()
                        .ok_or_else(|| format!("bad piece glyph {:?}", c))?;
                    if file >= 8 {
                        return Err(format!("rank {} overflows 8 files", rank + 1));
                    }
                    let bb = fresh.bb(color, piece) | (1u64 << (rank * 8 + file));
                    fresh.set_bb(color, piece, bb);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(format!("rank {} covers {} files", rank + 1, file));
            }
        }

        fresh.side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("bad side to move {:?}", other)),
        };

        fresh.castling_rights = parse_castling(castling)?;
        validate_castling_placement(&fresh)?;

        fresh.en_passant = match en_passant {
            "-" => None,
            sq => {
                let square: Square = sq.parse()?;
                let expected_rank = match fresh.side_to_move {
                    Color::White => 5,
                    Color::Black => 2,
                };
                if square.rank() != expected_rank {
                    return Err(format!("en-passant square {} on wrong rank", square));
                }
                Some(square)
            }
        };
        // A recorded right with no pawn to exercise it is normalized away so
        // the key and repetition state treat the position like any other
        // transposition. The board invariant that `en_passant` is always
        // capturable starts here.
        if !ep_capture_available(&fresh) {
            fresh.en_passant = None;
        }

        fresh.halfmove_clock = halfmove
            .parse()
            .map_err(|_| format!("bad halfmove clock {:?}", halfmove))?;
        fresh.fullmove_number = fullmove
            .parse()
            .map_err(|_| format!("bad fullmove number {:?}", fullmove))?;

        fresh.validate()?;
        fresh.reset_game_state();

        *self = fresh;
        Ok(())
    }

    /// Standard FEN of the current position.
    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let code = self.piece_on_sq[rank * 8 + file];
                if code == EMPTY_SQ {
                    empty += 1;
                } else {
                    if empty > 0 {
                        out.push(char::from_digit(empty, 10).unwrap_or('0'));
                        empty = 0;
                    }
                    let color = (code >> 3) & 1;
                    let piece = code & 0b111;
                    out.push(PC_TO_CHAR[color as usize * 6 + piece as usize]);
                }
            }
            if empty > 0 {
                out.push(char::from_digit(empty, 10).unwrap_or('0'));
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        out.push(' ');
        if self.castling_rights == 0 {
            out.push('-');
        } else {
            if self.castling_rights & CASTLE_WK != 0 {
                out.push('K');
            }
            if self.castling_rights & CASTLE_WQ != 0 {
                out.push('Q');
            }
            if self.castling_rights & CASTLE_BK != 0 {
                out.push('k');
            }
            if self.castling_rights & CASTLE_BQ != 0 {
                out.push('q');
            }
        }

        out.push(' ');
        match self.en_passant {
            Some(sq) => out.push_str(&sq.to_string()),
            None => out.push('-'),
        }

        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }
}

/// True when the side to move has a pawn that could capture onto the
/// recorded en-passant square (pseudo-legal, pins ignored).
fn ep_capture_available(board: &Board) -> bool {
    let Some(ep) = board.en_passant else {
        return false;
    };
    let us = board.side_to_move;
    // Squares our pawns would capture from are the reverse attacks of the
    // en-passant square.
    let sources = pawn_attacks(ep.index(), us.opposite());
    sources & board.pieces(Piece::Pawn, us) != 0
}

fn parse_castling(s: &str) -> Result<u8, String> {
    if s == "-" {
        return Ok(0);
    }
    let mut rights = 0u8;
    for c in s.chars() {
        rights |= match c {
            'K' => CASTLE_WK,
            'Q' => CASTLE_WQ,
            'k' => CASTLE_BK,
            'q' => CASTLE_BQ,
            other => return Err(format!("bad castling flag {:?}", other)),
        };
    }
    Ok(rights)
}

/// A right may only be recorded while its king and rook still stand on the
/// squares castling moves them from.
fn validate_castling_placement(board: &Board) -> Result<(), String> {
    let checks = [
        (CASTLE_WK, Color::White, 4u8, 7u8, "K"),
        (CASTLE_WQ, Color::White, 4, 0, "Q"),
        (CASTLE_BK, Color::Black, 60, 63, "k"),
        (CASTLE_BQ, Color::Black, 60, 56, "q"),
    ];
    for (flag, color, king_sq, rook_sq, name) in checks {
        if board.castling_rights & flag == 0 {
            continue;
        }
        let king_ok = board.bb(color, Piece::King) & (1u64 << king_sq) != 0;
        let rook_ok = board.bb(color, Piece::Rook) & (1u64 << rook_sq) != 0;
        if !king_ok || !rook_ok {
            return Err(format!(
                "castling right {:?} inconsistent with piece placement",
                name
            ));
        }
    }
    Ok(())
}
