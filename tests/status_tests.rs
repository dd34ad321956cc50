use sable::board::{Board, Color};
use sable::moves::execute::{generate_legal, make_move};
use sable::moves::magic::MagicTables;
use sable::moves::magic::loader::load_magic_tables;
use sable::moves::square_control::in_check;
use sable::moves::types::{Move, MoveList};
use sable::nnue::NnueNetwork;
use sable::status::{GameStatus, is_insufficient_material, is_search_draw, position_status};
use std::str::FromStr;

fn play(board: &mut Board, tables: &MagicTables, net: &NnueNetwork, text: &str) {
    let wanted = Move::from_uci(text).unwrap();
    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(board, tables, &mut legal, &mut scratch);
    let mv = *legal
        .iter()
        .find(|&&m| m == wanted)
        .unwrap_or_else(|| panic!("{} not legal in {}", text, board.to_fen()));
    make_move(board, mv, net);
}

#[test]
fn stalemate_is_detected() {
    let tables = load_magic_tables();
    let mut board = Board::from_str("7k/5K2/6Q1/8/8/8/8/8 b - - 0 1").unwrap();

    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(&mut board, &tables, &mut legal, &mut scratch);
    assert!(legal.is_empty());
    assert!(!in_check(&board, Color::Black, &tables));
    assert_eq!(position_status(&mut board, &tables), GameStatus::Stalemate);
}

#[test]
fn checkmate_reports_the_winner() {
    let tables = load_magic_tables();
    // Back-rank mate, black to move and mated.
    let mut board = Board::from_str("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1").unwrap();
    assert_eq!(
        position_status(&mut board, &tables),
        GameStatus::Checkmate(Color::White)
    );
}

#[test]
fn threefold_repetition_by_knight_shuffle() {
    let tables = load_magic_tables();
    let net = NnueNetwork::zeroed();
    let mut board = Board::new();

    for text in [
        "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
    ] {
        play(&mut board, &tables, &net, text);
    }

    assert_eq!(board.repetitions, 3);
    assert_eq!(
        position_status(&mut board, &tables),
        GameStatus::DrawThreefold
    );
    assert!(is_search_draw(&board));
}

#[test]
fn fifty_move_rule_uses_the_halfmove_clock() {
    let tables = load_magic_tables();
    let mut board = Board::from_str("4k3/8/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
    assert_eq!(position_status(&mut board, &tables), GameStatus::InPlay);

    let mut board = Board::from_str("4k3/8/8/8/8/8/8/R3K3 w - - 100 80").unwrap();
    assert_eq!(
        position_status(&mut board, &tables),
        GameStatus::DrawFiftyMove
    );
}

#[test]
fn insufficient_material_cases() {
    // Lone kings.
    let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    assert!(is_insufficient_material(&board));

    // King and single minor.
    let board = Board::from_str("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1").unwrap();
    assert!(is_insufficient_material(&board));
    let board = Board::from_str("4k3/8/8/8/8/8/8/2N1K3 w - - 0 1").unwrap();
    assert!(is_insufficient_material(&board));

    // Same-colored bishops cannot force anything: c1 and b8 are both dark.
    let board = Board::from_str("1b2k3/8/8/8/8/8/8/2B1K3 w - - 0 1").unwrap();
    assert!(is_insufficient_material(&board));

    // Opposite-colored bishops can still mate in the corner.
    let board = Board::from_str("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1").unwrap();
    assert!(!is_insufficient_material(&board));

    // Any pawn, rook or queen keeps the game alive.
    let board = Board::from_str("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
    assert!(!is_insufficient_material(&board));
    let board = Board::from_str("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
    assert!(!is_insufficient_material(&board));

    // Two knights against a bare king are not covered by the dead rules.
    let board = Board::from_str("4k3/8/8/8/8/8/8/1NN1K3 w - - 0 1").unwrap();
    assert!(!is_insufficient_material(&board));
}

#[test]
fn normal_positions_are_in_play() {
    let tables = load_magic_tables();
    let mut board = Board::new();
    assert_eq!(position_status(&mut board, &tables), GameStatus::InPlay);
    assert!(!is_search_draw(&board));
}
