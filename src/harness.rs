use crate::evaluation::Evaluator;
use crate::search::{SearchCore, SearchOutcome, SearchProgress, MATE_SCORE};
use crate::teaching::BiasEngine;
use crate::time_manager::{DepthPlan, SearchDeadline};
use chess::{Board, BoardStatus, ChessMove, MoveGen};
use rand::Rng;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Grace period past the budget before the hard timeout fires
    pub grace_ms: u64,
    /// Root moves within this many centipawns of the best are
    /// interchangeable at beginner levels
    pub variety_window_cp: i32,
    /// Highest level at which the variety window applies
    pub variety_max_level: u8,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            grace_ms: 250,
            variety_window_cp: 30,
            variety_max_level: 3,
        }
    }
}

/// Lifecycle of one move computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeState {
    Idle,
    Computing,
    Completed,
    TimedOut,
    Cancelled,
}

/// What the harness hands back: always a legal move for a non-terminal
/// position.
#[derive(Debug, Clone, Copy)]
pub struct HarnessResult {
    pub chosen_move: ChessMove,
    pub score: i32,
    pub depth_reached: u8,
    pub nodes_searched: u64,
    pub timed_out: bool,
    pub used_teaching_bias: bool,
}

/// Runs the search pipeline off the caller's synchronous path with a hard
/// timeout and a guaranteed-legal fallback.
///
/// A new request supersedes any in-flight computation by flipping its
/// cancel flag. Panics inside the pipeline are caught at this boundary and
/// treated like timeouts: the caller still receives a legal move.
pub struct CancellationHarness {
    config: HarnessConfig,
    active: Mutex<Option<Arc<AtomicBool>>>,
    state: Mutex<ComputeState>,
}

impl Default for CancellationHarness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

impl CancellationHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
            state: Mutex::new(ComputeState::Idle),
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> ComputeState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel any in-flight computation without issuing a new one.
    pub fn cancel_inflight(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(flag) = active.take() {
            flag.store(true, Ordering::Relaxed);
            self.set_state(ComputeState::Cancelled);
        }
    }

    /// Compute a move for `board` within `budget_ms` (+ grace). The board
    /// must not be terminal.
    pub fn run(
        &self,
        core: SearchCore,
        board: Board,
        plan: DepthPlan,
        budget_ms: u64,
        bias: Option<BiasEngine>,
        level: u8,
    ) -> HarnessResult {
        // Supersede any in-flight computation
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = active.replace(cancel.clone()) {
                previous.store(true, Ordering::Relaxed);
            }
        }
        self.set_state(ComputeState::Computing);

        let variety = self.variety_window(level);
        let evaluator = core.evaluator().clone();
        let progress = Arc::new(SearchProgress::default());
        let deadline = SearchDeadline::new(Duration::from_millis(budget_ms));
        let (tx, rx) = mpsc::channel();

        {
            let progress = Arc::clone(&progress);
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    core.search(
                        &board,
                        plan,
                        deadline,
                        cancel,
                        bias.as_ref(),
                        variety,
                        &progress,
                    )
                }));
                let _ = tx.send(result);
            });
        }

        let hard_timeout = Duration::from_millis(budget_ms + self.config.grace_ms);
        let result = match rx.recv_timeout(hard_timeout) {
            Ok(Ok(Ok(outcome))) => {
                self.set_state(if outcome.aborted {
                    ComputeState::TimedOut
                } else {
                    ComputeState::Completed
                });
                outcome.into()
            }
            Ok(Ok(Err(_abort))) => {
                // Not even one depth finished inside the budget
                warn!(budget_ms, "no depth completed, using one-ply fallback");
                self.set_state(ComputeState::TimedOut);
                self.degraded_result(&evaluator, &board, &progress, variety)
            }
            Ok(Err(_panic)) => {
                // A fault anywhere in the pipeline degrades, never fails
                warn!("search worker panicked, using one-ply fallback");
                self.set_state(ComputeState::TimedOut);
                self.degraded_result(&evaluator, &board, &progress, variety)
            }
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(
                    budget_ms,
                    grace_ms = self.config.grace_ms,
                    "hard timeout fired"
                );
                self.set_state(ComputeState::TimedOut);
                self.degraded_result(&evaluator, &board, &progress, variety)
            }
        };

        // Release the slot if it is still ours
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active
            .as_ref()
            .map(|flag| Arc::ptr_eq(flag, &cancel))
            .unwrap_or(false)
        {
            *active = None;
        }

        result
    }

    fn set_state(&self, state: ComputeState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn variety_window(&self, level: u8) -> Option<i32> {
        if level <= self.config.variety_max_level {
            Some(self.config.variety_window_cp)
        } else {
            None
        }
    }

    /// Best move from the last fully-completed depth, or the one-ply
    /// fallback when no depth completed at all.
    fn degraded_result(
        &self,
        evaluator: &Evaluator,
        board: &Board,
        progress: &SearchProgress,
        variety: Option<i32>,
    ) -> HarnessResult {
        if let Some(outcome) = progress.latest() {
            return HarnessResult {
                chosen_move: outcome.best_move,
                score: outcome.score,
                depth_reached: outcome.depth_reached,
                nodes_searched: outcome.nodes_searched,
                timed_out: true,
                used_teaching_bias: outcome.bias_applied,
            };
        }
        let (chosen_move, score, nodes) = one_ply_fallback(evaluator, board, variety);
        HarnessResult {
            chosen_move,
            score,
            depth_reached: 0,
            nodes_searched: nodes,
            timed_out: true,
            used_teaching_bias: false,
        }
    }
}

/// Static evaluation over the legal moves; guarantees a legal response for
/// any non-terminal position regardless of budget.
fn one_ply_fallback(
    evaluator: &Evaluator,
    board: &Board,
    variety: Option<i32>,
) -> (ChessMove, i32, u64) {
    let mut scored: Vec<(ChessMove, i32)> = MoveGen::new_legal(board)
        .map(|mv| {
            let after = board.make_move_new(mv);
            let score = match after.status() {
                BoardStatus::Checkmate => MATE_SCORE - 1,
                BoardStatus::Stalemate => 0,
                BoardStatus::Ongoing => -evaluator.evaluate(&after),
            };
            (mv, score)
        })
        .collect();
    let nodes = scored.len() as u64;
    scored.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    let best_score = scored[0].1;
    if let Some(window) = variety {
        let within = scored
            .iter()
            .take_while(|&&(_, score)| score >= best_score - window)
            .count();
        if within > 1 {
            let pick = rand::thread_rng().gen_range(0..within);
            let (mv, score) = scored[pick];
            return (mv, score, nodes);
        }
    }
    let (mv, score) = scored[0];
    (mv, score, nodes)
}

/// Convenience for callers of [`SearchOutcome`]-shaped data.
impl From<SearchOutcome> for HarnessResult {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            chosen_move: outcome.best_move,
            score: outcome.score,
            depth_reached: outcome.depth_reached,
            nodes_searched: outcome.nodes_searched,
            timed_out: outcome.aborted,
            used_teaching_bias: outcome.bias_applied,
        }
    }
}
