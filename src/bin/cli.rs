use sable::board::{Board, Color};
use sable::book::PolyglotBook;
use sable::moves::execute::{generate_legal, make_move};
use sable::moves::magic::MagicTables;
use sable::moves::magic::loader::load_magic_tables;
use sable::moves::types::{Move, MoveList};
use sable::nnue::NnueNetwork;
use sable::search::{Engine, MAX_DEPTH};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::str::FromStr;

fn weights_path() -> PathBuf {
    // The weights file ships next to the binary.
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("nnue.bin")))
        .unwrap_or_else(|| PathBuf::from("nnue.bin"))
}

fn main() {
    if let Err(e) = sable::logger::init_logging("logs/sable.log", "sable=info") {
        eprintln!("logging disabled: {}", e);
    }

    let tables = load_magic_tables();

    let (net, network_ok) = match NnueNetwork::load(weights_path()) {
        Ok(n) => (n, true),
        Err(e) => {
            // Position bookkeeping still works on a zero network, but
            // searching without weights would produce garbage moves.
            eprintln!("cannot load network weights: {}", e);
            (NnueNetwork::zeroed(), false)
        }
    };

    let book = PolyglotBook::load("book.bin").ok();
    if book.is_some() {
        println!("info string opening book loaded");
    }

    let mut engine = Engine::with_movetime(None);
    let mut board = Board::new();
    board.refresh_accumulator(&net);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l.trim().to_string(),
            Err(_) => break,
        };
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "uci" => {
                println!("id name Sable 0.9");
                println!("id author Sable developers");
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => {
                engine.reset();
                board = Board::new();
                board.refresh_accumulator(&net);
            }
            "position" => {
                if let Some(new_board) = handle_position(&parts, &tables, &net) {
                    board = new_board;
                }
            }
            "go" => {
                if !network_ok {
                    eprintln!("refusing to search: no network weights loaded");
                    println!("bestmove 0000");
                    continue;
                }
                handle_go(&parts, &mut engine, &mut board, &tables, &net, &book);
            }
            "fen" => println!("{}", board.to_fen()),
            "d" | "display" => println!("{}", board),
            "quit" => break,
            _ => {}
        }
    }
}

fn handle_position(parts: &[&str], tables: &MagicTables, net: &NnueNetwork) -> Option<Board> {
    let mut board = if parts.get(1) == Some(&"fen") {
        let fen_end = parts
            .iter()
            .position(|&p| p == "moves")
            .unwrap_or(parts.len());
        let fen = parts[2..fen_end].join(" ");
        match Board::from_str(&fen) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("bad position: {}", e);
                return None;
            }
        }
    } else {
        Board::new()
    };
    board.refresh_accumulator(net);

    if let Some(moves_idx) = parts.iter().position(|&p| p == "moves") {
        for move_str in &parts[moves_idx + 1..] {
            match find_legal_move(&mut board, move_str, tables) {
                Some(mv) => {
                    make_move(&mut board, mv, net);
                }
                None => {
                    // Protocol rule: unknown input is dropped, the position
                    // built so far stands.
                    eprintln!("ignoring illegal move {}", move_str);
                    break;
                }
            }
        }
    }

    Some(board)
}

/// Resolve long-algebraic text against the legal move list.
fn find_legal_move(board: &mut Board, text: &str, tables: &MagicTables) -> Option<Move> {
    let wanted = Move::from_uci(text)?;
    let mut legal = MoveList::new();
    let mut scratch = MoveList::new();
    generate_legal(board, tables, &mut legal, &mut scratch);
    legal.into_iter().find(|&mv| mv == wanted)
}

fn handle_go(
    parts: &[&str],
    engine: &mut Engine,
    board: &mut Board,
    tables: &MagicTables,
    net: &NnueNetwork,
    book: &Option<PolyglotBook>,
) {
    // Book probe happens before any clock math: a book hit costs nothing.
    if board.half_moves() < 10
        && let Some(b) = book
        && let Some(book_move) = b.probe(board)
    {
        println!("info string book move");
        println!("bestmove {}", book_move.to_uci());
        return;
    }

    let mut depth: Option<i32> = None;
    let mut movetime: Option<u64> = None;
    let mut wtime: Option<i64> = None;
    let mut btime: Option<i64> = None;
    let mut winc: i64 = 0;
    let mut binc: i64 = 0;

    let mut i = 1;
    while i < parts.len() {
        match (parts[i], parts.get(i + 1)) {
            ("depth", Some(v)) => depth = v.parse().ok(),
            ("movetime", Some(v)) => movetime = v.parse().ok(),
            ("wtime", Some(v)) => wtime = v.parse().ok(),
            ("btime", Some(v)) => btime = v.parse().ok(),
            ("winc", Some(v)) => winc = v.parse().unwrap_or(0),
            ("binc", Some(v)) => binc = v.parse().unwrap_or(0),
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    if let Some(d) = depth {
        engine.timed_game = false;
        engine.time_per_move = None;
        engine.max_depth = d.clamp(1, MAX_DEPTH);
    } else if let Some(ms) = movetime {
        engine.timed_game = false;
        engine.time_per_move = Some(ms);
        engine.max_depth = MAX_DEPTH;
    } else if wtime.is_some() || btime.is_some() {
        engine.timed_game = true;
        engine.max_depth = MAX_DEPTH;
        let (my_time, my_inc) = if board.side_to_move == Color::White {
            (wtime.unwrap_or(0), winc)
        } else {
            (btime.unwrap_or(0), binc)
        };
        engine.time_left = my_time;
        engine.increment = my_inc as f64 / 1000.0;
    }

    let best = engine.get_move(board, tables, net, false);
    if best.is_some() {
        println!(
            "info score cp {} nodes {}",
            engine.score,
            engine.ctx.negamax_nodes + engine.ctx.quiescence_nodes
        );
        println!("bestmove {}", best.to_uci());
    } else {
        println!("bestmove 0000");
    }
}
