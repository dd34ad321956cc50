use crate::board::{Board, Piece};
use crate::moves::execute::{
    generate_legal, is_legal_move, make_move, make_null_move, undo_null_move, unmake_move,
};
use crate::moves::magic::MagicTables;
use crate::moves::movegen::generate_tactics;
use crate::moves::square_control::in_check;
use crate::moves::types::{Move, MoveList};
use crate::nnue::{NnueNetwork, output_bucket};
use crate::search::context::{MAX_PLY, SearchContext};
use crate::search::picker::{MovePicker, Stage, is_pseudo_legal};
use crate::search::see::SeeExt;
use crate::search::tt::{Bound, TranspositionTable, TtEntry};
use crate::status::is_search_draw;
use std::time::{Duration, Instant};
use tracing::debug;

/// Score ceiling. Any |value| strictly above INF is the timeout sentinel
/// and never a game-theoretic score.
pub const INF: i32 = 1_000_000_000;

/// Timeout sentinel, propagated through every frame and never stored.
pub const TIMEOUT: i32 = INF + 1;

/// Iterative deepening and mate-distance ceiling.
pub const MAX_DEPTH: i32 = MAX_PLY as i32;

const MAX_Q_PLY: i32 = 100;

const TT_MEGABYTES: usize = 64;

// Pruning and ordering parameters.
const NULL_PRUNE_DEPTH: i32 = 3;
const RFP_DEPTH: i32 = 8;
const RFP_SCALE: i32 = 70;

const LMP_DEPTH: i32 = 5;
// Move-count bounds ×10: base + scale·depth², slightly looser when the
// static eval is improving.
const LMP_IMPROVING_BASE: i32 = 35;
const LMP_IMPROVING_SCALE: i32 = 6;
const LMP_BASE: i32 = 25;
const LMP_SCALE: i32 = 5;

const HISTORY_DIVISOR: i32 = 7000;

const FUTILITY_PRUNE_DEPTH: i32 = 6;
const FUTILITY_PRUNE_BASE: i32 = 100;
const FUTILITY_PRUNE_SCALE: i32 = 100;

const FP_CAP_DEPTH: i32 = 4;
const FP_CAP_BASE: i32 = 210;
const FP_CAP_SCALE: i32 = 250;
const FP_CAP_HIST: i32 = 7;

const SEE_PRUNE_DEPTH: i32 = 6;
const SEE_PRUNE_SCALE: i32 = -92;

const QSEARCH_SEE_MARGIN: i32 = 50;
const DELTA_PRUNE_MARGIN: i32 = 200;

const ASPIRATION_DELTA: i32 = 21;
const ASPIRATION_MIN_DEPTH: i32 = 5;
const ASPIRATION_RETRIES: i32 = 4;

/// True for scores that encode a forced mate at some ply.
#[inline(always)]
pub fn mate_score(val: i32) -> bool {
    val.abs() >= INF - MAX_DEPTH
}

/// Shift a mate score from search-relative to node-relative before storing.
#[inline(always)]
fn score_to_tt(val: i32, current_depth: i32) -> i32 {
    if val >= INF - MAX_DEPTH {
        val + current_depth
    } else if val <= -INF + MAX_DEPTH {
        val - current_depth
    } else {
        val
    }
}

/// Undo the store shift at the probing node.
#[inline(always)]
fn score_from_tt(val: i32, current_depth: i32) -> i32 {
    if val >= INF - MAX_DEPTH {
        val - current_depth
    } else if val <= -INF + MAX_DEPTH {
        val + current_depth
    } else {
        val
    }
}

/// Static NNUE evaluation of the current position, side-to-move relative.
#[inline(always)]
pub fn static_eval(board: &Board, net: &NnueNetwork) -> i32 {
    net.evaluate(
        &board.accumulator,
        board.side_to_move,
        output_bucket(board.occupied()),
    )
}

/// Wall-clock budget for one search. Polled cooperatively every 16 nodes.
pub struct SearchClock {
    start: Instant,
    budget: Option<Duration>,
}

impl SearchClock {
    pub fn new(budget_ms: Option<u64>) -> Self {
        Self {
            start: Instant::now(),
            budget: budget_ms.map(Duration::from_millis),
        }
    }

    #[inline(always)]
    pub fn expired(&self) -> bool {
        match self.budget {
            Some(limit) => self.start.elapsed() >= limit,
            None => false,
        }
    }

    #[inline(always)]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// The search driver: owns the transposition table, the heuristic tables
/// and the clock policy. One engine drives one game.
pub struct Engine {
    pub max_depth: i32,
    /// Score of the last completed iteration, side-to-move relative.
    pub score: i32,
    pub best_move: Move,

    /// Game-clock play: budget derived from remaining time each move.
    pub timed_game: bool,
    /// Fixed budget per move in milliseconds (None = depth-limited only).
    pub time_per_move: Option<u64>,
    /// Increment in seconds, game-clock play only.
    pub increment: f64,
    /// Remaining clock in milliseconds, game-clock play only.
    pub time_left: i64,

    pub tt: TranspositionTable,
    pub ctx: SearchContext,
}

impl Engine {
    /// Fixed time budget per move; `None` searches to the depth limit.
    pub fn with_movetime(time_per_move: Option<u64>) -> Self {
        Self {
            max_depth: MAX_DEPTH,
            score: 0,
            best_move: Move::NONE,
            timed_game: false,
            time_per_move,
            increment: 0.0,
            time_left: 0,
            tt: TranspositionTable::new(TT_MEGABYTES),
            ctx: SearchContext::new(),
        }
    }

    /// Game-clock play with `minutes` base time and `increment` seconds.
    pub fn with_clock(minutes: f64, increment: f64) -> Self {
        let mut engine = Self::with_movetime(None);
        engine.timed_game = true;
        engine.increment = increment;
        engine.time_left = (minutes * 60.0 * 1000.0) as i64;
        engine
    }

    /// Forget everything learned in the current game.
    pub fn reset(&mut self) {
        self.tt.clear();
        self.ctx.clear();
        self.best_move = Move::NONE;
        self.score = 0;
    }

    /// Depth-unlimited tail search over tactical moves only, to keep the
    /// horizon quiet before trusting the static evaluation.
    fn quiescence(
        &mut self,
        board: &mut Board,
        tables: &MagicTables,
        net: &NnueNetwork,
        mut alpha: i32,
        beta: i32,
        current_depth: i32,
    ) -> i32 {
        if is_search_draw(board) {
            return 0;
        }

        let checked = in_check(board, board.side_to_move, tables);

        // Mates and stalemates do not stand pat.
        if crate::moves::execute::no_legal_moves(board, tables) {
            return if checked { -INF + current_depth } else { 0 };
        }

        let stand = static_eval(board, net);
        if current_depth >= MAX_Q_PLY {
            return stand;
        }

        alpha = alpha.max(stand);
        if alpha >= beta {
            return alpha;
        }

        let mut tactics = MoveList::new();
        generate_tactics(board, tables, &mut tactics);
        tactics.sort_by_cached_key(|mv| std::cmp::Reverse(mv.exchange));

        for i in 0..tactics.len() {
            let mv = tactics[i];
            if !is_legal_move(board, mv, tables) {
                continue;
            }

            if !checked {
                // Delta prune: the best this capture can deliver still
                // leaves us below alpha.
                let victim = board
                    .piece_type_at(mv.to())
                    .map(Piece::value)
                    .unwrap_or(Piece::Pawn.value());
                if mv.promotion().is_none() && stand + victim + DELTA_PRUNE_MARGIN < alpha {
                    continue;
                }

                // SEE prune against the margin still needed to raise alpha.
                if !board.static_exchange_eval(
                    mv,
                    alpha - stand - QSEARCH_SEE_MARGIN,
                    tables,
                ) {
                    continue;
                }
            }

            self.ctx.quiescence_nodes += 1;
            let undo = make_move(board, mv, net);
            let val = -self.quiescence(board, tables, net, -beta, -alpha, current_depth + 1);
            unmake_move(board, undo);

            alpha = alpha.max(val);
            if alpha >= beta {
                return alpha;
            }
        }

        alpha
    }

    /// Negamax with alpha-beta pruning. Returns a side-to-move-relative
    /// score; any |value| above INF is the timeout sentinel and must be
    /// passed through untouched.
    #[allow(clippy::too_many_arguments)]
    fn negamax(
        &mut self,
        board: &mut Board,
        tables: &MagicTables,
        net: &NnueNetwork,
        mut remaining_depth: i32,
        current_depth: i32,
        mut alpha: i32,
        mut beta: i32,
        clock: &SearchClock,
    ) -> i32 {
        if self.ctx.negamax_nodes % 16 == 0 && clock.expired() {
            return TIMEOUT;
        }
        self.ctx.negamax_nodes += 1;

        let root_node = current_depth == 0;
        let pv_node = beta > alpha + 1;
        let old_alpha = alpha;

        if !root_node {
            if is_search_draw(board) {
                return 0;
            }

            // Mate-distance pruning: no line from here can beat a mate
            // already found closer to the root.
            alpha = alpha.max(-INF + current_depth);
            beta = beta.min(INF - current_depth - 1);
            if alpha >= beta {
                return alpha;
            }
        }

        let in_check_now = in_check(board, board.side_to_move, tables);
        if current_depth >= MAX_DEPTH || (remaining_depth <= 0 && !in_check_now) {
            return self.quiescence(board, tables, net, alpha, beta, current_depth);
        }
        remaining_depth = remaining_depth.max(0);

        // Transposition probe. The stored value is only trusted outside PV
        // nodes and outside unresolved repetition windows; the stored move
        // is always worth trying first.
        let mut hash_move = Move::NONE;
        let mut tt_info: Option<(i32, Bound)> = None;
        if let Some(entry) = self.tt.get(board.zobrist) {
            tt_info = Some((entry.value, entry.bound));
            hash_move = Move::from_raw(entry.best_move);

            if !pv_node
                && entry.depth as i32 >= remaining_depth
                && board.repetitions == 1
                && board.halfmove_clock < 90
                && board.occupied().count_ones() > 3
            {
                let val = score_from_tt(entry.value, current_depth);
                match entry.bound {
                    Bound::Exact => return val,
                    Bound::Upper => {
                        if val <= alpha {
                            return val;
                        }
                        beta = beta.min(val);
                    }
                    Bound::Lower => {
                        if val >= beta {
                            return val;
                        }
                        alpha = alpha.max(val);
                    }
                }
            }
        }

        let eval = static_eval(board, net);
        self.ctx.eval_stack[current_depth as usize] = eval;
        let improving = current_depth < 2
            || self.ctx.eval_stack[(current_depth - 2) as usize] < eval;

        // Reverse futility: statically so far above beta that a shallow
        // search cannot fall back under it.
        if !in_check_now
            && !pv_node
            && remaining_depth <= RFP_DEPTH
            && beta + RFP_SCALE * remaining_depth <= eval
        {
            return eval;
        }

        // Null move: pass the turn and prove beta with a reduced search.
        // Skipped without non-pawn material (zugzwang), below a null move
        // already (hash 0), and when the table already says we fail low.
        let non_pawn = board.non_pawn_material(board.side_to_move);
        let allow_null = match tt_info {
            None => true,
            Some((value, bound)) => bound == Bound::Lower || value >= beta,
        };
        if !pv_node
            && !in_check_now
            && remaining_depth >= NULL_PRUNE_DEPTH
            && eval >= beta
            && non_pawn > Piece::Rook.value()
            && board.zobrist != 0
            && allow_null
        {
            let undo = make_null_move(board);
            let r = 3 + remaining_depth / 4;
            let val = -self.negamax(
                board,
                tables,
                net,
                remaining_depth - 1 - r,
                current_depth + 1,
                -beta,
                -beta + 1,
                clock,
            );
            undo_null_move(board, undo);

            if val.abs() > INF {
                return val;
            }
            if val >= beta {
                // A mate through a null move is not a real mate.
                if mate_score(val) {
                    return beta;
                }
                return val;
            }
        }

        let mut local_max = -INF - 1;
        let mut hash_move_searched = false;
        let hash_move_is_capture =
            hash_move.is_some() && board.piece_type_at(hash_move.to()).is_some();

        // The hash move is searched before any generation happens.
        if hash_move.is_some()
            && is_pseudo_legal(board, hash_move, tables)
            && is_legal_move(board, hash_move, tables)
        {
            hash_move_searched = true;
            let moving = board
                .piece_type_at(hash_move.from())
                .unwrap_or(Piece::Pawn);
            let captured = board.piece_type_at(hash_move.to());

            let undo = make_move(board, hash_move, net);
            let extension = i32::from(in_check(board, board.side_to_move, tables));
            let val = -self.negamax(
                board,
                tables,
                net,
                remaining_depth - 1 + extension,
                current_depth + 1,
                -beta,
                -alpha,
                clock,
            );
            unmake_move(board, undo);

            if val.abs() > INF {
                return val;
            }
            local_max = val;

            if local_max >= beta {
                match captured {
                    None => {
                        self.ctx
                            .update_quiet_history(hash_move, remaining_depth, true);
                        self.ctx.update_killers(current_depth as usize, hash_move);
                    }
                    Some(victim) => {
                        self.ctx.update_capture_history(
                            hash_move,
                            moving,
                            victim,
                            remaining_depth,
                            true,
                        );
                    }
                }

                if root_node {
                    self.best_move = hash_move;
                }
                if board.zobrist != 0 {
                    self.tt.insert(TtEntry {
                        key: board.zobrist,
                        value: score_to_tt(local_max, current_depth),
                        best_move: hash_move.raw(),
                        bound: Bound::Lower,
                        depth: remaining_depth as u8,
                    });
                }
                return local_max;
            }
            alpha = alpha.max(local_max);
        }

        let mut picker = MovePicker::new(board, tables, &self.ctx, current_depth as usize);
        let mut local_best_move = hash_move;
        let mut num_moves: i32 = i32::from(hash_move_searched);

        while let Some((mv, stage)) = picker.next(board, tables, &self.ctx) {
            if mv == hash_move {
                continue;
            }
            num_moves += 1;

            // Late move pruning: enough quiets tried, the rest are noise.
            if !root_node && remaining_depth <= LMP_DEPTH && stage == Stage::Quiets {
                let bound_x10 = if improving {
                    LMP_IMPROVING_BASE + LMP_IMPROVING_SCALE * remaining_depth * remaining_depth
                } else {
                    LMP_BASE + LMP_SCALE * remaining_depth * remaining_depth
                };
                if num_moves * 10 >= bound_x10 {
                    picker.skip_quiets();
                    continue;
                }
            }

            // Futility: statically hopeless, quiets cannot recover enough.
            if !in_check_now
                && remaining_depth <= FUTILITY_PRUNE_DEPTH
                && stage == Stage::Quiets
                && local_max >= -INF
                && eval + FUTILITY_PRUNE_BASE + FUTILITY_PRUNE_SCALE * remaining_depth <= alpha
            {
                picker.skip_quiets();
                continue;
            }

            let moving = board.piece_type_at(mv.from()).unwrap_or(Piece::Pawn);
            let captured = board.piece_type_at(mv.to());

            // Capture futility for the deferred losing tactics.
            if !in_check_now
                && remaining_depth <= FP_CAP_DEPTH
                && stage == Stage::BadTactics
                && local_max >= -INF
            {
                let capture_kind = captured.unwrap_or(Piece::Pawn);
                let hist = self.ctx.capture_history_for(mv, moving, capture_kind);
                if eval
                    + FP_CAP_BASE
                    + FP_CAP_SCALE * remaining_depth
                    + capture_kind.value()
                    + hist / FP_CAP_HIST
                    <= alpha
                {
                    continue;
                }
            }

            // Quiet SEE pruning: skip quiets that expose material.
            if remaining_depth <= SEE_PRUNE_DEPTH
                && stage == Stage::Quiets
                && !board.static_exchange_eval(mv, SEE_PRUNE_SCALE * remaining_depth, tables)
            {
                continue;
            }

            // Late move reduction.
            let mut r = 0;
            if !pv_node && num_moves >= 3 && remaining_depth >= 3 {
                if num_moves <= 6 || remaining_depth <= 5 || in_check_now || mv.exchange > 0 {
                    r = 1;
                } else if (num_moves >= 10 && remaining_depth >= 8) || num_moves >= 15 {
                    r = 3;
                } else {
                    r = 2;
                }
                // The table already showed a capture refutation; be more
                // skeptical of quiet alternatives.
                if mv.exchange == 0 && hash_move_is_capture {
                    r += 1;
                }
            }
            if mv.exchange == 0 {
                r -= self.ctx.quiet_history[mv.from().index() as usize]
                    [mv.to().index() as usize]
                    / HISTORY_DIVISOR;
                if num_moves < 3 || remaining_depth < 2 {
                    r = r.min(0);
                }
            }
            // Recaptures stay interesting however late they come.
            if mv.exchange != 0 && board.last_move.is_some() && mv.to() == board.last_move.to() {
                r -= 1;
            }

            self.ctx.negamax_nodes += 1;
            let undo = make_move(board, mv, net);

            if stage == Stage::GoodTactics && in_check(board, board.side_to_move, tables) {
                r -= 1;
            }
            let reduced = r > 0;
            r = r.max(-1);

            let val;
            if local_max < -INF {
                // First move: full window, full depth.
                val = -self.negamax(
                    board,
                    tables,
                    net,
                    remaining_depth - 1,
                    current_depth + 1,
                    -beta,
                    -alpha,
                    clock,
                );
            } else {
                let mut v = -self.negamax(
                    board,
                    tables,
                    net,
                    remaining_depth - 1 - r,
                    current_depth + 1,
                    -alpha - 1,
                    -alpha,
                    clock,
                );
                if v.abs() <= INF && v > alpha && (reduced || pv_node) {
                    v = -self.negamax(
                        board,
                        tables,
                        net,
                        remaining_depth - 1,
                        current_depth + 1,
                        -beta,
                        -alpha,
                        clock,
                    );
                }
                val = v;
            }
            unmake_move(board, undo);

            if val.abs() > INF {
                return val;
            }

            if val > local_max {
                local_max = val;
                local_best_move = mv;
            }

            if local_max >= beta {
                if mv.exchange == 0 {
                    self.ctx.update_quiet_history(mv, remaining_depth, true);
                    self.ctx.update_killers(current_depth as usize, mv);
                } else {
                    // En passant leaves the destination empty; its victim is
                    // a pawn by construction.
                    let victim = captured.unwrap_or(Piece::Pawn);
                    self.ctx
                        .update_capture_history(mv, moving, victim, remaining_depth, true);
                }
                break;
            }

            // The move failed to beat beta: push its ordering signal down.
            if mv.exchange == 0 {
                self.ctx.update_quiet_history(mv, remaining_depth, false);
            } else {
                let victim = captured.unwrap_or(Piece::Pawn);
                self.ctx
                    .update_capture_history(mv, moving, victim, remaining_depth, false);
            }

            alpha = alpha.max(local_max);
        }

        if local_max < -INF {
            // No legal move was searched at all.
            return if in_check_now {
                -INF + current_depth
            } else {
                0
            };
        }

        let bound = if local_max <= old_alpha {
            Bound::Upper
        } else if local_max >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };

        if board.zobrist != 0 {
            self.tt.insert(TtEntry {
                key: board.zobrist,
                value: score_to_tt(local_max, current_depth),
                best_move: local_best_move.raw(),
                bound,
                depth: remaining_depth as u8,
            });
        }

        if root_node {
            self.best_move = local_best_move;
        }

        local_max
    }

    /// Search with a window around the previous depth's score, widening on
    /// failure. Falls back to a full window after enough retries.
    fn aspiration_window(
        &mut self,
        board: &mut Board,
        tables: &MagicTables,
        net: &NnueNetwork,
        remaining_depth: i32,
        estimate: i32,
        clock: &SearchClock,
    ) -> i32 {
        let mut delta = ASPIRATION_DELTA - remaining_depth / 5;
        let mut alpha = estimate - delta;
        let mut beta = estimate + delta;

        for _ in 0..ASPIRATION_RETRIES {
            let val = self.negamax(board, tables, net, remaining_depth, 0, alpha, beta, clock);

            if val.abs() > INF {
                return val;
            }

            if val <= alpha {
                // Fail low: pull beta toward the middle, drop alpha further.
                beta = (alpha + beta) / 2;
                alpha = (alpha - delta).max(-INF - 1);
            } else if val >= beta {
                beta = (beta + delta).min(INF + 1);
            } else {
                return val;
            }

            delta += delta / 2;
        }

        self.negamax(board, tables, net, remaining_depth, 0, -INF - 1, INF + 1, clock)
    }

    /// Iterative deepening driver. Returns the best move found within the
    /// time or depth budget; `verbose` prints a small search report.
    pub fn get_move(
        &mut self,
        board: &mut Board,
        tables: &MagicTables,
        net: &NnueNetwork,
        verbose: bool,
    ) -> Move {
        let start = Instant::now();
        self.ctx.negamax_nodes = 0;
        self.ctx.quiescence_nodes = 0;
        self.best_move = Move::NONE;

        let mut legal = MoveList::new();
        let mut scratch = MoveList::new();
        generate_legal(board, tables, &mut legal, &mut scratch);
        if legal.is_empty() {
            return Move::NONE;
        }

        let mut budget = self.time_per_move;
        if self.timed_game {
            // A forced reply costs no time.
            if legal.len() == 1 {
                self.time_left += (self.increment * 1000.0) as i64;
                self.best_move = legal[0];
                return legal[0];
            }
            budget = Some((self.time_left / 10).max(1) as u64);
        }
        let clock = SearchClock::new(budget);

        let mut move_found = false;
        let mut eval = 0;
        let mut completed_depth = 0;

        for depth in 1..=self.max_depth {
            let val = if depth < ASPIRATION_MIN_DEPTH {
                self.negamax(board, tables, net, depth, 0, -INF - 1, INF + 1, &clock)
            } else {
                self.aspiration_window(board, tables, net, depth, eval, &clock)
            };

            if val.abs() > INF {
                break;
            }

            move_found = true;
            eval = val;
            completed_depth = depth;
            debug!(
                depth,
                score = val,
                nodes = self.ctx.negamax_nodes,
                qnodes = self.ctx.quiescence_nodes,
                "depth complete"
            );

            if self.timed_game {
                let taken = clock.elapsed_ms() as i64;
                if taken > self.time_left / 20 + (500.0 * self.increment) as i64 {
                    break;
                }
            }
        }

        if !move_found || self.best_move.is_none() {
            self.best_move = legal[0];
        }
        self.score = eval;

        let taken_ms = start.elapsed().as_millis() as i64;
        if verbose {
            println!("time: {:.3}", taken_ms as f64 / 1000.0);
            println!("depth: {}", completed_depth);
            println!("evaluation: {}", self.score);
            println!("negamax nodes: {}", self.ctx.negamax_nodes);
            println!("quiescence nodes: {}", self.ctx.quiescence_nodes);
        }

        if self.timed_game {
            self.time_left -= taken_ms;
            self.time_left += (self.increment * 1000.0) as i64;
        }

        self.best_move
    }
}
