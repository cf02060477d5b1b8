use crate::evaluation::Evaluator;
use crate::ordering::{MoveOrderer, RankedMove};
use crate::teaching::BiasEngine;
use crate::time_manager::{DepthPlan, SearchDeadline};
use chess::{Board, BoardStatus, ChessMove};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Mate sentinel. A mate found at ply `p` scores `MATE_SCORE - p`, so
/// shorter mates always outrank longer ones and any mate outranks any
/// static evaluation.
pub const MATE_SCORE: i32 = 30_000;

/// Scores at or above this magnitude are mate scores
pub const MATE_THRESHOLD: i32 = MATE_SCORE - 256;

/// Nodes between cooperative deadline checks inside a depth
const DEADLINE_POLL_INTERVAL: u64 = 1024;

/// Why a search stopped before finishing its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAbort {
    DeadlineExpired,
    Cancelled,
}

/// Per-invocation search state: node counter, deadline and cancel flag.
/// Created for a single move computation and discarded afterwards.
pub struct SearchContext {
    pub nodes_searched: u64,
    deadline: SearchDeadline,
    cancel: Arc<AtomicBool>,
}

impl SearchContext {
    pub fn new(deadline: SearchDeadline, cancel: Arc<AtomicBool>) -> Self {
        Self {
            nodes_searched: 0,
            deadline,
            cancel,
        }
    }

    fn check_abort(&self) -> Result<(), SearchAbort> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(SearchAbort::Cancelled);
        }
        if self.deadline.expired() {
            return Err(SearchAbort::DeadlineExpired);
        }
        Ok(())
    }

    fn visit_node(&mut self) -> Result<(), SearchAbort> {
        self.nodes_searched += 1;
        if self.nodes_searched % DEADLINE_POLL_INTERVAL == 0 {
            self.check_abort()
        } else {
            Ok(())
        }
    }
}

/// Result of the last fully-completed depth.
#[derive(Debug, Clone, Copy)]
pub struct SearchOutcome {
    pub best_move: ChessMove,
    /// Score in centipawns from the mover's perspective, teaching bias
    /// included when applied
    pub score: i32,
    pub depth_reached: u8,
    pub nodes_searched: u64,
    /// A nonzero teaching bias influenced at least one root candidate
    pub bias_applied: bool,
    /// The deadline or a cancellation cut iterative deepening short
    pub aborted: bool,
}

/// Best-so-far slot shared with the harness so a hard timeout can still
/// read the last fully-completed depth.
#[derive(Debug, Default)]
pub struct SearchProgress {
    best: Mutex<Option<SearchOutcome>>,
}

impl SearchProgress {
    pub fn latest(&self) -> Option<SearchOutcome> {
        *self.best.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, outcome: SearchOutcome) {
        *self.best.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
    }
}

/// Iterative-deepening minimax (negamax form) with alpha-beta pruning.
///
/// A depth's result becomes authoritative only when the whole depth
/// completes before the deadline; an abort mid-depth propagates as an error
/// through the recursion and the partial pass is discarded wholesale.
#[derive(Debug, Clone, Default)]
pub struct SearchCore {
    evaluator: Evaluator,
    orderer: MoveOrderer,
}

impl SearchCore {
    pub fn new(evaluator: Evaluator, orderer: MoveOrderer) -> Self {
        Self { evaluator, orderer }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn orderer(&self) -> &MoveOrderer {
        &self.orderer
    }

    /// Run the search to `plan.max_depth`. Returns the last
    /// fully-completed depth's outcome, or the abort reason if not even
    /// depth one (or the fixed depth) finished.
    ///
    /// `variety_window_cp`, when set, picks uniformly among root moves
    /// within that many centipawns of the best — beginner levels should
    /// not replay identical games.
    pub fn search(
        &self,
        board: &Board,
        plan: DepthPlan,
        deadline: SearchDeadline,
        cancel: Arc<AtomicBool>,
        bias: Option<&BiasEngine>,
        variety_window_cp: Option<i32>,
        progress: &SearchProgress,
    ) -> Result<SearchOutcome, SearchAbort> {
        let ranked = self.orderer.order(board);
        if ranked.is_empty() {
            // Terminal positions are screened by the caller
            return Err(SearchAbort::Cancelled);
        }

        // Root biases depend only on the static evaluation of each child
        // position, so they are computed once and reused at every depth
        let root_biases: Vec<i32> = match bias {
            Some(engine) => ranked
                .iter()
                .map(|rm| {
                    let after = board.make_move_new(rm.mv);
                    let raw = -self.evaluator.evaluate(&after);
                    engine.bias_for(&after, raw)
                })
                .collect(),
            None => vec![0; ranked.len()],
        };
        let bias_applied = root_biases.iter().any(|&b| b != 0);

        let start_depth = if plan.iterative { 1 } else { plan.max_depth };
        let mut best: Option<SearchOutcome> = None;

        for depth in start_depth..=plan.max_depth {
            if let Err(abort) = self.check_between_depths(&deadline, &cancel) {
                return finish(best, abort);
            }

            let mut ctx = SearchContext::new(deadline, cancel.clone());
            ctx.nodes_searched = best.map(|b| b.nodes_searched).unwrap_or(0);

            match self.search_root(board, &ranked, &root_biases, depth, variety_window_cp, &mut ctx)
            {
                Ok((mv, score)) => {
                    let outcome = SearchOutcome {
                        best_move: mv,
                        score,
                        depth_reached: depth,
                        nodes_searched: ctx.nodes_searched,
                        bias_applied,
                        aborted: false,
                    };
                    progress.record(outcome);
                    best = Some(outcome);
                    debug!(
                        depth,
                        score,
                        nodes = ctx.nodes_searched,
                        best_move = %mv,
                        "depth completed"
                    );
                    // A forced mate found: deeper passes cannot improve it
                    if score >= MATE_THRESHOLD {
                        break;
                    }
                }
                Err(abort) => return finish(best, abort),
            }
        }

        best.ok_or(SearchAbort::DeadlineExpired)
    }

    fn check_between_depths(
        &self,
        deadline: &SearchDeadline,
        cancel: &AtomicBool,
    ) -> Result<(), SearchAbort> {
        if cancel.load(Ordering::Relaxed) {
            return Err(SearchAbort::Cancelled);
        }
        if deadline.expired() {
            return Err(SearchAbort::DeadlineExpired);
        }
        Ok(())
    }

    /// One full alpha-beta pass at `depth` over the pre-ranked root moves.
    fn search_root(
        &self,
        board: &Board,
        ranked: &[RankedMove],
        root_biases: &[i32],
        depth: u8,
        variety_window_cp: Option<i32>,
        ctx: &mut SearchContext,
    ) -> Result<(ChessMove, i32), SearchAbort> {
        let mut scored: Vec<(ChessMove, i32)> = Vec::with_capacity(ranked.len());
        let mut alpha = -MATE_SCORE - 1;
        let beta = MATE_SCORE + 1;

        for (i, rm) in ranked.iter().enumerate() {
            let after = board.make_move_new(rm.mv);
            let subtree = -self.alpha_beta(&after, depth.saturating_sub(1), -beta, -alpha, 1, ctx)?;
            let score = subtree + root_biases[i];
            scored.push((rm.mv, score));
            if score > alpha {
                alpha = score;
            }
        }

        let (best_move, best_score) = scored
            .iter()
            .copied()
            .max_by_key(|&(_, score)| score)
            .expect("root move list is non-empty");

        if let Some(window) = variety_window_cp {
            let candidates: Vec<(ChessMove, i32)> = scored
                .into_iter()
                .filter(|&(_, score)| score >= best_score - window)
                .collect();
            if candidates.len() > 1 {
                let pick = rand::thread_rng().gen_range(0..candidates.len());
                return Ok(candidates[pick]);
            }
        }

        Ok((best_move, best_score))
    }

    fn alpha_beta(
        &self,
        board: &Board,
        depth: u8,
        mut alpha: i32,
        beta: i32,
        ply: u8,
        ctx: &mut SearchContext,
    ) -> Result<i32, SearchAbort> {
        ctx.visit_node()?;

        // Terminal states come from the rules engine and short-circuit
        match board.status() {
            BoardStatus::Checkmate => return Ok(-(MATE_SCORE - i32::from(ply))),
            BoardStatus::Stalemate => return Ok(0),
            BoardStatus::Ongoing => {}
        }

        if depth == 0 {
            return Ok(self.evaluator.evaluate(board));
        }

        let ranked = self.orderer.order(board);
        let mut best = -MATE_SCORE - 1;

        for rm in &ranked {
            let after = board.make_move_new(rm.mv);
            let score = -self.alpha_beta(&after, depth - 1, -beta, -alpha, ply + 1, ctx)?;
            if score > best {
                best = score;
            }
            if best > alpha {
                alpha = best;
            }
            if alpha >= beta {
                break;
            }
        }

        Ok(best)
    }
}

fn finish(best: Option<SearchOutcome>, abort: SearchAbort) -> Result<SearchOutcome, SearchAbort> {
    match best {
        Some(outcome) => Ok(SearchOutcome {
            aborted: true,
            ..outcome
        }),
        None => Err(abort),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::MoveGen;
    use std::str::FromStr;
    use std::time::Duration;

    fn run_search(board: &Board, depth: u8, limit_ms: u64) -> Result<SearchOutcome, SearchAbort> {
        let core = SearchCore::default();
        let progress = SearchProgress::default();
        core.search(
            board,
            DepthPlan {
                max_depth: depth,
                iterative: true,
            },
            SearchDeadline::new(Duration::from_millis(limit_ms)),
            Arc::new(AtomicBool::new(false)),
            None,
            None,
            &progress,
        )
    }

    #[test]
    fn test_returns_legal_move_from_start() {
        let board = Board::default();
        let outcome = run_search(&board, 3, 30_000).unwrap();
        let legal: Vec<ChessMove> = MoveGen::new_legal(&board).collect();
        assert_eq!(legal.len(), 20);
        assert!(legal.contains(&outcome.best_move));
        assert_eq!(outcome.depth_reached, 3);
        assert!(!outcome.aborted);
        assert!(outcome.nodes_searched > 0);
    }

    #[test]
    fn test_finds_mate_in_one() {
        // Ra8# is the only mate
        let board = Board::from_str("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let outcome = run_search(&board, 3, 30_000).unwrap();
        assert_eq!(outcome.best_move.to_string(), "a1a8");
        assert!(outcome.score >= MATE_THRESHOLD);
    }

    #[test]
    fn test_prefers_shorter_mate() {
        // Mate in one is available; a slower mate also exists
        let board = Board::from_str("6k1/5ppp/8/8/8/8/1Q6/R5K1 w - - 0 1").unwrap();
        let outcome = run_search(&board, 4, 30_000).unwrap();
        // The score encodes the mate distance: ply 1
        assert_eq!(outcome.score, MATE_SCORE - 1);
    }

    #[test]
    fn test_avoids_hanging_the_queen() {
        // After 1.e4 e5 2.Qh5 g6 the capture Qxg6 loses the queen
        let board =
            Board::from_str("rnbqkbnr/pppp1p1p/6p1/4p2Q/4P3/8/PPPP1PPP/RNB1KBNR w KQkq - 0 3")
                .unwrap();
        let outcome = run_search(&board, 3, 30_000).unwrap();
        assert_ne!(outcome.best_move.to_string(), "h5g6");
    }

    #[test]
    fn test_expired_deadline_yields_no_result() {
        let board = Board::default();
        let result = run_search(&board, 5, 0);
        assert!(matches!(result, Err(SearchAbort::DeadlineExpired)));
    }

    #[test]
    fn test_cancellation_mid_search() {
        let board = Board::default();
        let core = SearchCore::default();
        let progress = SearchProgress::default();
        let cancel = Arc::new(AtomicBool::new(true));
        let result = core.search(
            &board,
            DepthPlan {
                max_depth: 5,
                iterative: true,
            },
            SearchDeadline::new(Duration::from_secs(60)),
            cancel,
            None,
            None,
            &progress,
        );
        assert!(matches!(result, Err(SearchAbort::Cancelled)));
    }

    #[test]
    fn test_depth_one_matches_static_ranking() {
        // At depth 1 the chosen move maximizes the child's negated
        // static evaluation
        let board =
            Board::from_str("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
                .unwrap();
        let core = SearchCore::default();
        let outcome = run_search(&board, 1, 30_000).unwrap();
        let brute_best = MoveGen::new_legal(&board)
            .map(|mv| {
                let after = board.make_move_new(mv);
                let score = match after.status() {
                    BoardStatus::Checkmate => MATE_SCORE - 1,
                    BoardStatus::Stalemate => 0,
                    BoardStatus::Ongoing => -core.evaluator().evaluate(&after),
                };
                (mv, score)
            })
            .max_by_key(|&(_, s)| s)
            .unwrap();
        assert_eq!(outcome.score, brute_best.1);
    }

    #[test]
    fn test_progress_records_completed_depths() {
        let board = Board::default();
        let core = SearchCore::default();
        let progress = SearchProgress::default();
        let outcome = core
            .search(
                &board,
                DepthPlan {
                    max_depth: 2,
                    iterative: true,
                },
                SearchDeadline::new(Duration::from_secs(60)),
                Arc::new(AtomicBool::new(false)),
                None,
                None,
                &progress,
            )
            .unwrap();
        let latest = progress.latest().unwrap();
        assert_eq!(latest.depth_reached, outcome.depth_reached);
        assert_eq!(latest.best_move, outcome.best_move);
    }
}
