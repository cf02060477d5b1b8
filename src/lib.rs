//! # Chess Coach Engine
//!
//! The move-selection core for an adversarial chess opponent embedded in a
//! coaching application: a time-bounded, adaptive search that always returns
//! a legal move under a strict wall-clock budget.
//!
//! ## Features
//!
//! - **Tactical pre-filter**: move ordering by MVV-LVA with a hanging-piece
//!   scan on capture and check candidates, so cheap blunders are avoided
//!   before the search even starts
//! - **Iterative-deepening search**: minimax with alpha-beta pruning; only
//!   fully-completed depths are authoritative, so a deadline mid-depth never
//!   poisons the result
//! - **Adaptive time management**: a 0–100 criticality score allocates
//!   budget and depth per position, with a bounded time bank for critical
//!   moments
//! - **Teaching bias**: confidence-scored weakness signatures nudge move
//!   selection toward positions that exercise a player's known mistakes,
//!   bounded so the engine never hangs material to teach a lesson
//! - **Guaranteed response**: a cancellation harness with a hard timeout and
//!   a one-ply fallback — timeouts and internal faults degrade quality,
//!   never availability
//!
//! ## Quick Start
//!
//! ```rust
//! use chess_coach_engine::{CoachEngine, MoveRequest};
//!
//! let mut engine = CoachEngine::new();
//! let request = MoveRequest {
//!     fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
//!     depth_hint: Some(3),
//!     time_budget_ms: None,
//!     level: 5,
//!     signatures: Vec::new(),
//! };
//!
//! let response = engine.select_move(&request).unwrap();
//! println!(
//!     "{} (depth {}, {} nodes)",
//!     response.chosen_move, response.depth_reached, response.nodes_searched
//! );
//! ```
//!
//! Legal-move generation, FEN parsing and terminal-state detection come from
//! the `chess` crate; this engine never re-implements chess legality.

pub mod criticality;
pub mod errors;
pub mod evaluation;
pub mod harness;
pub mod history;
pub mod ordering;
pub mod search;
pub mod teaching;
pub mod time_manager;

pub use criticality::{CriticalityAnalyzer, CriticalityReport, CriticalityWeights};
pub use errors::{CoachEngineError, GameOutcome, Result};
pub use evaluation::{EvalWeights, Evaluator, GamePhase, PieceValues};
pub use harness::{CancellationHarness, ComputeState, HarnessConfig, HarnessResult};
pub use history::{InMemorySignatureStore, SignatureStore, SqliteSignatureStore, HISTORY_CAPACITY};
pub use ordering::{MoveOrderer, OrderingWeights, RankedMove};
pub use search::{SearchCore, SearchOutcome, SearchProgress, MATE_SCORE};
pub use teaching::{
    BiasEngine, ContextFeature, ContextFingerprint, ImprovementTrend, WeaknessCategory,
    WeaknessSignature, CONFIDENCE_GATE, MAX_LEVEL,
};
pub use time_manager::{DepthPlan, SearchDeadline, TimeBudget, TimeControlConfig, TimeManager};

use chess::{Board, BoardStatus, ChessMove};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Depth ceiling applied to caller-supplied depth hints
const MAX_SUPPORTED_DEPTH: u8 = 12;

/// One move request, as handed over by the calling application.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    /// Position in FEN; rejected with [`CoachEngineError::InvalidPosition`]
    /// if malformed
    pub fen: String,
    /// Overrides the level's adaptive depth plan when set
    pub depth_hint: Option<u8>,
    /// Overrides the time manager's budget formula when set, in milliseconds
    pub time_budget_ms: Option<u64>,
    /// Difficulty level, 1..=8
    pub level: u8,
    /// Read-only snapshot of the player's top weakness signatures; empty
    /// disables teaching bias
    pub signatures: Vec<WeaknessSignature>,
}

/// The engine's answer: a legal move plus search telemetry.
#[derive(Debug, Clone, Copy)]
pub struct MoveResponse {
    pub chosen_move: ChessMove,
    /// Deepest fully-completed search depth; 0 for the one-ply fallback
    pub depth_reached: u8,
    pub nodes_searched: u64,
    /// Score in centipawns from the engine's perspective
    pub evaluation_cp: i32,
    /// The budget expired before the planned depth finished
    pub timed_out: bool,
    /// A weakness signature biased the chosen ordering
    pub used_teaching_bias: bool,
}

/// Engine-wide configuration, one named struct per component.
#[derive(Debug, Clone, Default)]
pub struct CoachConfig {
    pub eval_weights: EvalWeights,
    pub ordering_weights: OrderingWeights,
    pub criticality_weights: CriticalityWeights,
    pub time_control: TimeControlConfig,
    pub harness: HarnessConfig,
}

/// Facade wiring the pipeline: criticality → time budget → search under
/// the cancellation harness.
pub struct CoachEngine {
    evaluator: Evaluator,
    orderer: MoveOrderer,
    criticality: CriticalityAnalyzer,
    time_manager: TimeManager,
    harness: CancellationHarness,
}

impl Default for CoachEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CoachEngine {
    pub fn new() -> Self {
        Self::with_config(CoachConfig::default())
    }

    pub fn with_config(config: CoachConfig) -> Self {
        let evaluator = Evaluator::new(config.eval_weights);
        Self {
            criticality: CriticalityAnalyzer::new(config.criticality_weights, evaluator.clone()),
            orderer: MoveOrderer::new(config.ordering_weights),
            time_manager: TimeManager::new(config.time_control),
            harness: CancellationHarness::new(config.harness),
            evaluator,
        }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn time_manager(&self) -> &TimeManager {
        &self.time_manager
    }

    pub fn harness(&self) -> &CancellationHarness {
        &self.harness
    }

    /// Select a move for the request's position.
    ///
    /// Always returns a legal move for a valid, non-terminal position —
    /// timeouts and internal faults degrade to shallower results rather
    /// than surfacing as errors.
    pub fn select_move(&mut self, request: &MoveRequest) -> Result<MoveResponse> {
        if !(1..=MAX_LEVEL).contains(&request.level) {
            return Err(CoachEngineError::ConfigurationError(format!(
                "level must be 1..={}, got {}",
                MAX_LEVEL, request.level
            )));
        }

        let board = Board::from_str(&request.fen)
            .map_err(|e| CoachEngineError::InvalidPosition(e.to_string()))?;

        match board.status() {
            BoardStatus::Checkmate => {
                return Err(CoachEngineError::NoLegalMoves(GameOutcome::Checkmate))
            }
            BoardStatus::Stalemate => {
                return Err(CoachEngineError::NoLegalMoves(GameOutcome::Stalemate))
            }
            BoardStatus::Ongoing => {}
        }

        let report = self.criticality.analyze(&board);
        let phase = self.evaluator.game_phase(&board);

        let mut plan = self.time_manager.depth_plan(request.level, &report);
        if let Some(hint) = request.depth_hint {
            plan.max_depth = hint.clamp(1, MAX_SUPPORTED_DEPTH);
        }

        let budget = match request.time_budget_ms {
            Some(ms) => TimeBudget::fixed(ms),
            None => self.time_manager.allocate(&report, phase, request.level),
        };

        let bias = if request.signatures.is_empty() {
            None
        } else {
            Some(BiasEngine::new(
                &request.signatures,
                request.level,
                self.evaluator.clone(),
            ))
        };

        debug!(
            level = request.level,
            criticality = report.score,
            budget_ms = budget.allotted_ms,
            max_depth = plan.max_depth,
            biased = bias.is_some(),
            "move request accepted"
        );

        let core = SearchCore::new(self.evaluator.clone(), self.orderer.clone());
        let started = Instant::now();
        let result = self
            .harness
            .run(core, board, plan, budget.allotted_ms, bias, request.level);
        self.time_manager
            .settle(&budget, started.elapsed().as_millis() as u64);

        Ok(MoveResponse {
            chosen_move: result.chosen_move,
            depth_reached: result.depth_reached,
            nodes_searched: result.nodes_searched,
            evaluation_cp: result.score,
            timed_out: result.timed_out,
            used_teaching_bias: result.used_teaching_bias,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::MoveGen;

    fn request(fen: &str, level: u8) -> MoveRequest {
        MoveRequest {
            fen: fen.to_string(),
            depth_hint: Some(3),
            time_budget_ms: Some(10_000),
            level,
            signatures: Vec::new(),
        }
    }

    #[test]
    fn test_starting_position_returns_one_of_twenty_moves() {
        let mut engine = CoachEngine::new();
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let response = engine.select_move(&request(fen, 5)).unwrap();
        let board = Board::from_str(fen).unwrap();
        let legal: Vec<ChessMove> = MoveGen::new_legal(&board).collect();
        assert_eq!(legal.len(), 20);
        assert!(legal.contains(&response.chosen_move));
    }

    #[test]
    fn test_invalid_fen_rejected() {
        let mut engine = CoachEngine::new();
        let result = engine.select_move(&request("not a position", 5));
        assert!(matches!(result, Err(CoachEngineError::InvalidPosition(_))));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut engine = CoachEngine::new();
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let result = engine.select_move(&request(fen, 0));
        assert!(matches!(
            result,
            Err(CoachEngineError::ConfigurationError(_))
        ));
        let result = engine.select_move(&request(fen, 9));
        assert!(matches!(
            result,
            Err(CoachEngineError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_checkmate_propagates_no_legal_moves() {
        let mut engine = CoachEngine::new();
        // Fool's mate final position, white to move and mated
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let result = engine.select_move(&request(fen, 5));
        assert!(matches!(
            result,
            Err(CoachEngineError::NoLegalMoves(GameOutcome::Checkmate))
        ));
    }

    #[test]
    fn test_stalemate_propagates_no_legal_moves() {
        let mut engine = CoachEngine::new();
        // Cornered king with no moves, black to move
        let fen = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
        let result = engine.select_move(&request(fen, 5));
        assert!(matches!(
            result,
            Err(CoachEngineError::NoLegalMoves(GameOutcome::Stalemate))
        ));
    }

    #[test]
    fn test_depth_hint_is_respected() {
        let mut engine = CoachEngine::new();
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let mut req = request(fen, 8);
        req.depth_hint = Some(2);
        let response = engine.select_move(&req).unwrap();
        assert_eq!(response.depth_reached, 2);
        assert!(!response.timed_out);
    }
}
