use crate::board::{Board, EMPTY_SQ, Piece};
use crate::moves::execute::{generate_legal, is_legal_move, make_move, no_legal_moves, unmake_move};
use crate::moves::magic::MagicTables;
use crate::moves::types::{Move, MoveList};
use crate::nnue::NnueNetwork;
use tracing::debug;

/// Leaf classification counters for the published perft reference sequences.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PerftCounts {
    pub nodes: u64,
    pub captures: u64,
    pub en_passants: u64,
    pub checks: u64,
    pub checkmates: u64,
}

/// Node count at `depth`, with bulk counting at the horizon.
pub fn perft(board: &mut Board, tables: &MagicTables, net: &NnueNetwork, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(board, tables, &mut legal, &mut scratch);

    if depth == 1 {
        return legal.len() as u64;
    }

    let mut nodes = 0;
    for &mv in &legal {
        let undo = make_move(board, mv, net);
        nodes += perft(board, tables, net, depth - 1);
        unmake_move(board, undo);
    }
    nodes
}

/// Per-root-move node counts, for comparing against another engine's
/// `divide` output when a total disagrees.
pub fn perft_divide(
    board: &mut Board,
    tables: &MagicTables,
    net: &NnueNetwork,
    depth: u32,
) -> Vec<(Move, u64)> {
    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(board, tables, &mut legal, &mut scratch);

    let mut out = Vec::with_capacity(legal.len());
    for &mv in &legal {
        let undo = make_move(board, mv, net);
        let nodes = if depth <= 1 {
            1
        } else {
            perft(board, tables, net, depth - 1)
        };
        unmake_move(board, undo);
        debug!(mv = %mv, nodes, "divide");
        out.push((mv, nodes));
    }
    out
}

/// Full leaf classification: captures and en passants count the move that
/// reaches the leaf, checks and checkmates describe the leaf itself.
pub fn perft_counts(
    board: &mut Board,
    tables: &MagicTables,
    net: &NnueNetwork,
    depth: u32,
) -> PerftCounts {
    let mut counts = PerftCounts::default();
    if depth == 0 {
        counts.nodes = 1;
        return counts;
    }
    perft_counts_inner(board, tables, net, depth, &mut counts);
    counts
}

fn perft_counts_inner(
    board: &mut Board,
    tables: &MagicTables,
    net: &NnueNetwork,
    depth: u32,
    counts: &mut PerftCounts,
) {
    let mut scratch = MoveList::new();
    crate::moves::movegen::generate_pseudo_legal(board, tables, &mut scratch);

    for i in 0..scratch.len() {
        let mv = scratch[i];
        if !is_legal_move(board, mv, tables) {
            continue;
        }

        if depth == 1 {
            let to_idx = mv.to().index() as usize;
            let mover_is_pawn = board.piece_on_sq[mv.from().index() as usize] & 0b111
                == Piece::Pawn as u8;
            let is_ep =
                mover_is_pawn && board.en_passant == Some(mv.to()) && mv.from().file() != mv.to().file();
            let is_capture = is_ep || board.piece_on_sq[to_idx] != EMPTY_SQ;

            let undo = make_move(board, mv, net);
            counts.nodes += 1;
            if is_capture {
                counts.captures += 1;
            }
            if is_ep {
                counts.en_passants += 1;
            }
            let stm = board.side_to_move;
            if crate::moves::square_control::in_check(board, stm, tables) {
                counts.checks += 1;
                if no_legal_moves(board, tables) {
                    counts.checkmates += 1;
                }
            }
            unmake_move(board, undo);
        } else {
            let undo = make_move(board, mv, net);
            perft_counts_inner(board, tables, net, depth - 1, counts);
            unmake_move(board, undo);
        }
    }
}
