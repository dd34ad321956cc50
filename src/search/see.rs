use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, Piece};
use crate::moves::king::KING_ATTACKS;
use crate::moves::knight::KNIGHT_ATTACKS;
use crate::moves::magic::MagicTables;
use crate::moves::pawn::pawn_attacks;
use crate::moves::types::Move;

pub trait SeeExt {
    /// True when the capture sequence on the move's destination, assuming
    /// best play by both sides, gains at least `threshold`. A threshold of 0
    /// asks "does this move not lose material".
    fn static_exchange_eval(&self, mv: Move, threshold: i32, tables: &MagicTables) -> bool;

    /// All pieces of `color` attacking `square` under a simulated
    /// `occupancy`, so captured attackers disappear and x-ray attackers
    /// behind sliders are revealed.
    fn attackers_to(&self, square: u8, color: Color, occupancy: u64, tables: &MagicTables) -> u64;
}

impl SeeExt for Board {
    fn attackers_to(&self, square: u8, color: Color, occupancy: u64, tables: &MagicTables) -> u64 {
        let sq = square as usize;

        // Squares from which a pawn of `color` reaches `square` are the
        // reverse pawn attacks.
        let pawns = pawn_attacks(square, color.opposite()) & self.pieces(Piece::Pawn, color);
        let knights = KNIGHT_ATTACKS[sq] & self.pieces(Piece::Knight, color);
        let kings = KING_ATTACKS[sq] & self.pieces(Piece::King, color);

        let queens = self.pieces(Piece::Queen, color);
        let diag = tables.bishop.get_attacks(sq, occupancy)
            & (self.pieces(Piece::Bishop, color) | queens);
        let orth =
            tables.rook.get_attacks(sq, occupancy) & (self.pieces(Piece::Rook, color) | queens);

        (pawns | knights | kings | diag | orth) & occupancy
    }

    fn static_exchange_eval(&self, mv: Move, threshold: i32, tables: &MagicTables) -> bool {
        let from = mv.from();
        let to = mv.to();

        let Some((move_color, moving)) = self.piece_at(from) else {
            return threshold <= 0;
        };
        // A promoting pawn trades as the promoted piece.
        let attacker_kind = mv.promotion().unwrap_or(moving);

        // En passant lands on an empty square and starts the exchange at 0,
        // like a quiet destination.
        let mut exchange = self.piece_type_at(to).map(Piece::value).unwrap_or(0);
        let mut last_attacker = attacker_kind.value();

        // Even if the attacker is lost outright the exchange meets the bar.
        if exchange >= last_attacker + threshold {
            return true;
        }

        let mut blockers = self.occupied();
        blockers &= !from.bb();
        blockers |= to.bb();

        let mut turn = move_color.opposite();
        let mut attackers = self.attackers_to(to.index(), turn, blockers, tables) & blockers;

        while attackers != 0 {
            // Weakest attacker of the side to recapture.
            let mut next: Option<(Piece, u8)> = None;
            for kind in [
                Piece::Pawn,
                Piece::Knight,
                Piece::Bishop,
                Piece::Rook,
                Piece::Queen,
            ] {
                let subset = self.pieces(kind, turn) & attackers;
                if subset != 0 {
                    next = Some((kind, subset.lsb()));
                    break;
                }
            }

            let Some((next_kind, next_sq)) = next else {
                // Only the king is left. It may recapture only if the square
                // is otherwise undefended.
                if self.attackers_to(to.index(), turn.opposite(), blockers, tables) & blockers == 0 {
                    if turn == move_color {
                        exchange += last_attacker;
                    } else {
                        exchange -= last_attacker;
                    }
                }
                return exchange >= threshold;
            };

            if turn == move_color {
                exchange += last_attacker;
                // Stand pat: recapturing cannot make it worse than this.
                if exchange >= next_kind.value() {
                    return true;
                }
            } else {
                exchange -= last_attacker;
                if exchange + next_kind.value() < 0 {
                    return false;
                }
            }

            last_attacker = next_kind.value();

            // Remove the used attacker; sliders behind it appear on the
            // next attackers recomputation.
            blockers &= !(1u64 << next_sq);
            turn = turn.opposite();
            attackers = self.attackers_to(to.index(), turn, blockers, tables) & blockers;
        }

        exchange >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::magic::loader::load_magic_tables;
    use crate::square::Square;
    use std::str::FromStr;

    fn mv(from: &str, to: &str) -> Move {
        Move::new(
            Square::from_str(from).unwrap(),
            Square::from_str(to).unwrap(),
            None,
        )
    }

    #[test]
    fn pawn_takes_defended_pawn_is_even() {
        let tables = load_magic_tables();
        let board = Board::from_str("4k3/8/8/3p4/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert!(board.static_exchange_eval(mv("e4", "d5"), 0, &tables));
        assert!(!board.static_exchange_eval(mv("e4", "d5"), 101, &tables));
    }

    #[test]
    fn queen_takes_defended_pawn_loses_material() {
        let tables = load_magic_tables();
        let board = Board::from_str("4k3/4p3/3p4/8/8/8/3Q4/4K3 w - - 0 1").unwrap();
        assert!(!board.static_exchange_eval(mv("d2", "d6"), 0, &tables));
    }

    #[test]
    fn xray_defender_counts() {
        let tables = load_magic_tables();
        // Rook takes pawn on d5; the capture looks safe until the queen
        // behind the black rook recaptures through the vacated square.
        let board = Board::from_str("3q4/3r4/8/3p4/8/8/3R4/3RK2k w - - 0 1").unwrap();
        // Rd2xd5: pawn 100, rook recaptures, our rook behind recaptures,
        // queen recaptures. 100 - 500 + 500 - 500 ... losing sequence.
        assert!(!board.static_exchange_eval(mv("d2", "d5"), 0, &tables));
    }

    #[test]
    fn undefended_piece_is_free() {
        let tables = load_magic_tables();
        let board = Board::from_str("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1").unwrap();
        assert!(board.static_exchange_eval(mv("d1", "d5"), 0, &tables));
        assert!(board.static_exchange_eval(mv("d1", "d5"), 900, &tables));
        assert!(!board.static_exchange_eval(mv("d1", "d5"), 901, &tables));
    }

    #[test]
    fn king_cannot_recapture_defended_square() {
        let tables = load_magic_tables();
        // Kxd2 would be recaptured by the rook on d8: the king stands pat.
        let board = Board::from_str("3rk3/8/8/8/8/8/3q4/3K4 w - - 0 1").unwrap();
        // Kd1xd2 wins the queen but the square stays defended; the king may
        // not actually recapture, so the exchange is just the queen minus
        // nothing only if undefended. Here SEE must notice the defense.
        assert!(!board.static_exchange_eval(mv("d1", "d2"), 900, &tables));
    }
}
