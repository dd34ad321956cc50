use sable::board::{Board, Color, Piece};
use sable::moves::execute::{generate_legal, make_move, make_null_move, undo_null_move, unmake_move};
use sable::moves::magic::MagicTables;
use sable::moves::magic::loader::load_magic_tables;
use sable::moves::types::{Move, MoveList};
use sable::nnue::{HIDDEN_SIZE, INPUT_SIZE, NnueNetwork, OUTPUT_BUCKETS};
use std::str::FromStr;

/// Deterministic small-magnitude network so accumulator mismatches show up
/// as real value differences instead of zeros cancelling out.
fn test_net() -> NnueNetwork {
    let total =
        INPUT_SIZE * HIDDEN_SIZE + HIDDEN_SIZE + 2 * OUTPUT_BUCKETS * HIDDEN_SIZE + OUTPUT_BUCKETS;
    let mut bytes = Vec::with_capacity(total * 2);
    let mut state = 0x1234_5678_9ABC_DEF0u64;
    for _ in 0..total {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let w = ((state % 17) as i16) - 8;
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    NnueNetwork::from_bytes(&bytes).unwrap()
}

fn uci(board: &mut Board, tables: &MagicTables, text: &str) -> Move {
    let wanted = Move::from_uci(text).unwrap();
    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(board, tables, &mut legal, &mut scratch);
    *legal
        .iter()
        .find(|&&mv| mv == wanted)
        .unwrap_or_else(|| panic!("{} is not legal in {}", text, board.to_fen()))
}

/// A scripted game touching every special move: double pushes, an en
/// passant capture, both castles, captures and a promotion.
const SCRIPTED_GAME: [&str; 24] = [
    "e2e4", "g8f6", "e4e5", "d7d5", "e5d6", "c7d6", "g1f3", "b8c6", "f1b5", "c8d7", "e1g1",
    "d8a5", "b5c6", "d7c6", "d2d4", "e8c8", "c1g5", "h7h6", "g5f6", "g7f6", "d4d5", "c6d5",
    "d1d5", "b7b5",
];

#[test]
fn make_unmake_is_an_exact_inverse_along_a_game() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    for text in SCRIPTED_GAME {
        let before = board.clone();
        let mv = uci(&mut board, &tables, text);

        let undo = make_move(&mut board, mv, &net);
        assert_ne!(board, before, "{} must change the position", text);
        unmake_move(&mut board, undo);

        assert_eq!(board, before, "unmake({}) did not restore the position", text);

        // Now actually play the move and keep going.
        make_move(&mut board, mv, &net);
    }
}

#[test]
fn incremental_state_matches_recomputation_along_a_game() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    for text in SCRIPTED_GAME {
        let mv = uci(&mut board, &tables, text);
        make_move(&mut board, mv, &net);

        // Hash
        assert_eq!(board.zobrist, board.compute_zobrist_full(), "after {}", text);

        // Material
        let mut recomputed = board.clone();
        recomputed.recompute_material();
        assert_eq!(board.material, recomputed.material, "after {}", text);

        // Accumulators
        let mut refreshed = board.clone();
        refreshed.refresh_accumulator(&net);
        assert_eq!(
            board.accumulator, refreshed.accumulator,
            "accumulator drifted after {}",
            text
        );

        // Board/bitboard partition
        board.validate().unwrap();
    }
}

#[test]
fn every_legal_move_round_trips_from_a_tactical_position() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board =
        Board::from_str("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    board.refresh_accumulator(&net);

    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(&mut board, &tables, &mut legal, &mut scratch);
    assert_eq!(legal.len(), 48);

    let before = board.clone();
    for mv in legal {
        let undo = make_move(&mut board, mv, &net);
        unmake_move(&mut board, undo);
        assert_eq!(board, before, "round trip failed for {}", mv);
    }
}

#[test]
fn en_passant_capture_updates_everything() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    for text in ["e2e4", "a7a6", "e4e5", "d7d5"] {
        let mv = uci(&mut board, &tables, text);
        make_move(&mut board, mv, &net);
    }

    // The double push landed next to the e5 pawn: the right is live on
    // file d.
    let ep = board.en_passant.expect("en-passant square must be set");
    assert_eq!(ep.file(), 3);
    assert_eq!(ep.to_string(), "d6");

    let black_material_before = board.material[Color::Black as usize];
    let mv = uci(&mut board, &tables, "e5d6");
    make_move(&mut board, mv, &net);

    // The captured pawn sat on d5, not on the destination square.
    assert!(board.piece_at("d5".parse().unwrap()).is_none());
    assert_eq!(
        board.piece_at("d6".parse().unwrap()),
        Some((Color::White, Piece::Pawn))
    );
    assert_eq!(
        board.material[Color::Black as usize],
        black_material_before - 100
    );
}

#[test]
fn double_push_without_adjacent_pawn_sets_no_en_passant() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    let mv = uci(&mut board, &tables, "e2e4");
    make_move(&mut board, mv, &net);
    assert_eq!(board.en_passant, None);
}

#[test]
fn promotion_changes_material_by_the_difference() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::from_str("8/P3k3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    board.refresh_accumulator(&net);

    let before = board.material[Color::White as usize];
    let mv = uci(&mut board, &tables, "a7a8q");
    let undo = make_move(&mut board, mv, &net);

    assert_eq!(board.material[Color::White as usize], before + 800);
    assert_eq!(
        board.piece_at("a8".parse().unwrap()),
        Some((Color::White, Piece::Queen))
    );

    unmake_move(&mut board, undo);
    assert_eq!(board.material[Color::White as usize], before);
    assert_eq!(
        board.piece_at("a7".parse().unwrap()),
        Some((Color::White, Piece::Pawn))
    );
}

#[test]
fn castling_moves_the_rook_and_clears_rights() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    board.refresh_accumulator(&net);

    let before = board.clone();
    let mv = uci(&mut board, &tables, "e1g1");
    let undo = make_move(&mut board, mv, &net);

    assert_eq!(
        board.piece_at("f1".parse().unwrap()),
        Some((Color::White, Piece::Rook))
    );
    assert_eq!(
        board.piece_at("g1".parse().unwrap()),
        Some((Color::White, Piece::King))
    );
    assert!(!board.has_kingside_castle(Color::White));
    assert!(!board.has_queenside_castle(Color::White));
    assert!(board.has_kingside_castle(Color::Black));

    unmake_move(&mut board, undo);
    assert_eq!(board, before);
}

#[test]
fn rook_capture_on_corner_revokes_the_right() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::from_str("r3k2r/8/8/8/8/8/6B1/R3K2R w KQkq - 0 1").unwrap();
    board.refresh_accumulator(&net);

    let mv = uci(&mut board, &tables, "g2a8");
    make_move(&mut board, mv, &net);
    assert!(!board.has_queenside_castle(Color::Black));
    assert!(board.has_kingside_castle(Color::Black));
}

#[test]
fn null_move_flips_side_and_reserves_the_key() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);
    let _ = tables;

    let before = board.clone();
    let undo = make_null_move(&mut board);
    assert_eq!(board.side_to_move, Color::Black);
    assert_eq!(board.zobrist, 0, "null frames must be unhashable");
    assert_eq!(board.en_passant, None);

    undo_null_move(&mut board, undo);
    assert_eq!(board, before);
}

#[test]
fn fifty_move_counter_resets_on_pawn_moves_and_captures() {
    let tables = load_magic_tables();
    let net = test_net();
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    let mv = uci(&mut board, &tables, "g1f3");
    make_move(&mut board, mv, &net);
    assert_eq!(board.halfmove_clock, 1);
    let mv = uci(&mut board, &tables, "g8f6");
    make_move(&mut board, mv, &net);
    assert_eq!(board.halfmove_clock, 2);
    let mv = uci(&mut board, &tables, "d2d4");
    make_move(&mut board, mv, &net);
    assert_eq!(board.halfmove_clock, 0);
}
