use crate::evaluation::{Evaluator, GamePhase};
use crate::ordering::count_attackers;
use chess::{Board, Color, MoveGen, Piece};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence below which a signature never biases move selection
pub const CONFIDENCE_GATE: f64 = 0.7;
/// Bias magnitude cap as a fraction of the raw evaluation
pub const BIAS_CAP_FRACTION: f64 = 0.15;
/// Signatures applied per move request
pub const MAX_ACTIVE_SIGNATURES: usize = 3;
/// Highest difficulty level; bias scales with level / MAX_LEVEL
pub const MAX_LEVEL: u8 = 8;

/// Observation count at which the count term of the confidence formula
/// saturates: log10(n+1) / log10(SATURATION_COUNT + 1)
const SATURATION_COUNT: f64 = 20.0;
const CONFIDENCE_COUNT_WEIGHT: f64 = 0.7;
const CONFIDENCE_EMA_WEIGHT: f64 = 0.3;
const EMA_ALPHA: f64 = 0.2;

/// Outcomes retained per signature; enough for both trend windows
const OBSERVATION_WINDOW: usize = 20;
const TREND_WINDOW: usize = 10;
const TREND_DEAD_ZONE: f64 = 0.2;

// Teaching-priority term weights
const PRIORITY_CONFIDENCE_WEIGHT: f64 = 0.35;
const PRIORITY_MASTERY_WEIGHT: f64 = 0.25;
const PRIORITY_RECENCY_WEIGHT: f64 = 0.20;
const PRIORITY_IMPACT_WEIGHT: f64 = 0.20;
/// Days after which recency has decayed to half weight
const RECENCY_HALF_WEIGHT_DAYS: f64 = 7.0;

/// Mistake pattern categories tracked across games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaknessCategory {
    HangingPieces,
    MissedCapture,
    BackRankWeakness,
    KnightFork,
    PinnedPiece,
    EarlyQueenSortie,
    KingExposure,
    PassivePieces,
}

impl WeaknessCategory {
    /// Relative severity of the mistake class, in [0, 1].
    pub fn severity(self) -> f64 {
        match self {
            WeaknessCategory::HangingPieces => 1.0,
            WeaknessCategory::MissedCapture => 0.9,
            WeaknessCategory::BackRankWeakness => 0.85,
            WeaknessCategory::KnightFork => 0.8,
            WeaknessCategory::PinnedPiece => 0.7,
            WeaknessCategory::KingExposure => 0.65,
            WeaknessCategory::EarlyQueenSortie => 0.5,
            WeaknessCategory::PassivePieces => 0.4,
        }
    }
}

/// Direction of a player's recent results against a weakness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImprovementTrend {
    Improving,
    Stable,
    Worsening,
}

/// Positional features a weakness typically co-occurs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextFeature {
    /// The side to move has a piece attacked and undefended
    OwnPieceHanging,
    /// The side to move is in check
    InCheck,
    /// The side to move has at least one capture available
    CaptureAvailable,
    /// The side to move's king has left its back rank before the endgame
    ExposedKing,
    /// The side to move's queen is out past its second rank in the opening
    QueenSortie,
    /// The side to move has a knight on the rim
    RimKnight,
    /// Both of the side to move's minor-piece sets are undeveloped
    UndevelopedMinors,
}

/// Game phase plus feature set describing where a weakness shows up.
///
/// A signature's fingerprint matches a position when the phases agree and
/// every signature feature is present in the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFingerprint {
    pub phase: GamePhase,
    pub features: Vec<ContextFeature>,
}

impl ContextFingerprint {
    pub fn new(phase: GamePhase, features: Vec<ContextFeature>) -> Self {
        Self { phase, features }
    }

    /// Extract the fingerprint of a position, from the side to move's
    /// perspective.
    pub fn of_position(board: &Board, evaluator: &Evaluator) -> Self {
        let mover = board.side_to_move();
        let mut features = Vec::new();

        if board.checkers().popcnt() > 0 {
            features.push(ContextFeature::InCheck);
        }
        if MoveGen::new_legal(board).any(|mv| board.piece_on(mv.get_dest()).is_some()) {
            features.push(ContextFeature::CaptureAvailable);
        }
        if has_hanging_piece(board, mover) {
            features.push(ContextFeature::OwnPieceHanging);
        }

        let phase = evaluator.game_phase(board);

        let king_rank = board.king_square(mover).get_rank().to_index();
        let home_rank = match mover {
            Color::White => 0,
            Color::Black => 7,
        };
        if phase != GamePhase::Endgame && king_rank != home_rank {
            features.push(ContextFeature::ExposedKing);
        }

        if phase == GamePhase::Opening {
            let queens = board.pieces(Piece::Queen) & board.color_combined(mover);
            for square in queens {
                let rank = square.get_rank().to_index();
                let advanced = match mover {
                    Color::White => rank > 1,
                    Color::Black => rank < 6,
                };
                if advanced {
                    features.push(ContextFeature::QueenSortie);
                    break;
                }
            }
        }

        let knights = board.pieces(Piece::Knight) & board.color_combined(mover);
        for square in knights {
            let file = square.get_file().to_index();
            let rank = square.get_rank().to_index();
            if (file == 0 || file == 7) && (2..=5).contains(&rank) {
                features.push(ContextFeature::RimKnight);
                break;
            }
        }

        let minors = (board.pieces(Piece::Knight) | board.pieces(Piece::Bishop))
            & board.color_combined(mover);
        let back_rank = match mover {
            Color::White => chess::get_rank(chess::Rank::First),
            Color::Black => chess::get_rank(chess::Rank::Eighth),
        };
        if (minors & back_rank).popcnt() >= 3 {
            features.push(ContextFeature::UndevelopedMinors);
        }

        Self { phase, features }
    }

    /// Whether `position` (an extracted fingerprint) exhibits this
    /// signature's context.
    pub fn matches(&self, position: &ContextFingerprint) -> bool {
        self.phase == position.phase
            && self
                .features
                .iter()
                .all(|feature| position.features.contains(feature))
    }
}

fn has_hanging_piece(board: &Board, color: Color) -> bool {
    for piece in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight, Piece::Pawn] {
        let own = board.pieces(piece) & board.color_combined(color);
        for square in own {
            if count_attackers(board, square, !color) > 0
                && count_attackers(board, square, color) == 0
            {
                return true;
            }
        }
    }
    false
}

/// A confidence-scored record of one recurring player mistake pattern.
///
/// Owned by the append-only history store; the engine reads a snapshot per
/// move request and never writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaknessSignature {
    pub category: WeaknessCategory,
    /// Total times the pattern was observed
    pub occurrences: u32,
    /// How reliably the pattern recurs, in [0, 1]
    pub confidence: f64,
    /// Player's mastery of the theme, 0–100
    pub mastery: f64,
    pub trend: ImprovementTrend,
    pub fingerprint: ContextFingerprint,
    /// Rank assigned by the store when reading top-N; 0 if unranked
    pub priority_rank: u32,
    /// Most recent outcomes, 1.0 = the mistake recurred, 0.0 = avoided
    pub recent_outcomes: Vec<f64>,
    pub last_observed: DateTime<Utc>,
}

impl WeaknessSignature {
    pub fn new(category: WeaknessCategory, fingerprint: ContextFingerprint) -> Self {
        Self {
            category,
            occurrences: 0,
            confidence: 0.0,
            mastery: 50.0,
            trend: ImprovementTrend::Stable,
            fingerprint,
            priority_rank: 0,
            recent_outcomes: Vec::new(),
            last_observed: Utc::now(),
        }
    }

    /// Record one observation of the pattern. `hit` means the player made
    /// the mistake again. Called by the history store owner after a game,
    /// never during a search.
    pub fn record_observation(&mut self, hit: bool, at: DateTime<Utc>) {
        self.occurrences += 1;
        self.recent_outcomes.push(if hit { 1.0 } else { 0.0 });
        if self.recent_outcomes.len() > OBSERVATION_WINDOW {
            self.recent_outcomes.remove(0);
        }
        self.last_observed = at;
        self.confidence = self.compute_confidence();
        self.trend = self.compute_trend();
    }

    /// `0.7 × log10(n+1)/log10(21) + 0.3 × EMA(recent, α=0.2)`, clamped
    /// to [0, 1]. Grows slowly and stabilizes around 15–20 observations.
    fn compute_confidence(&self) -> f64 {
        let n = f64::from(self.occurrences);
        let count_term = ((n + 1.0).log10() / (SATURATION_COUNT + 1.0).log10()).min(1.0);
        let ema_term = ema(&self.recent_outcomes, EMA_ALPHA);
        (CONFIDENCE_COUNT_WEIGHT * count_term + CONFIDENCE_EMA_WEIGHT * ema_term).clamp(0.0, 1.0)
    }

    /// Mean hit-rate over the latest window versus the preceding one. A
    /// falling hit-rate means the player is improving.
    fn compute_trend(&self) -> ImprovementTrend {
        if self.recent_outcomes.len() < TREND_WINDOW * 2 {
            return ImprovementTrend::Stable;
        }
        let split = self.recent_outcomes.len() - TREND_WINDOW;
        let older = &self.recent_outcomes[split - TREND_WINDOW..split];
        let newer = &self.recent_outcomes[split..];
        let delta = mean(newer) - mean(older);
        if delta > TREND_DEAD_ZONE {
            ImprovementTrend::Worsening
        } else if delta < -TREND_DEAD_ZONE {
            ImprovementTrend::Improving
        } else {
            ImprovementTrend::Stable
        }
    }

    /// Serialize for the coaching UI, which exchanges signatures as JSON.
    pub fn to_json(&self) -> crate::errors::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Weighted sum of confidence, inverse mastery, recency and
    /// severity-weighted impact. Higher means more worth teaching now.
    pub fn teaching_priority(&self, now: DateTime<Utc>) -> f64 {
        let inverse_mastery = 1.0 - (self.mastery / 100.0).clamp(0.0, 1.0);
        let age_days = (now - self.last_observed).num_hours().max(0) as f64 / 24.0;
        let recency = 1.0 / (1.0 + age_days / RECENCY_HALF_WEIGHT_DAYS);
        let impact =
            self.category.severity() * (f64::from(self.occurrences) / SATURATION_COUNT).min(1.0);

        PRIORITY_CONFIDENCE_WEIGHT * self.confidence
            + PRIORITY_MASTERY_WEIGHT * inverse_mastery
            + PRIORITY_RECENCY_WEIGHT * recency
            + PRIORITY_IMPACT_WEIGHT * impact
    }
}

fn ema(values: &[f64], alpha: f64) -> f64 {
    let mut iter = values.iter();
    let mut acc = match iter.next() {
        Some(&first) => first,
        None => return 0.0,
    };
    for &value in iter {
        acc = alpha * value + (1.0 - alpha) * acc;
    }
    acc
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Select the top signatures for one move request, by teaching priority.
pub fn select_top_signatures(
    signatures: &[WeaknessSignature],
    now: DateTime<Utc>,
) -> Vec<WeaknessSignature> {
    let mut ranked: Vec<WeaknessSignature> = signatures.to_vec();
    ranked.sort_by(|a, b| {
        b.teaching_priority(now)
            .partial_cmp(&a.teaching_priority(now))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(MAX_ACTIVE_SIGNATURES);
    ranked
}

/// Applies weakness-targeted bias to candidate moves.
///
/// The bias is additive to the search score and bounded by
/// `0.15 × |raw evaluation| × (level / 8)`; a signature below the 0.7
/// confidence gate contributes exactly zero.
#[derive(Debug, Clone)]
pub struct BiasEngine {
    selected: Vec<WeaknessSignature>,
    level: u8,
    evaluator: Evaluator,
}

impl BiasEngine {
    pub fn new(signatures: &[WeaknessSignature], level: u8, evaluator: Evaluator) -> Self {
        Self {
            selected: select_top_signatures(signatures, Utc::now()),
            level,
            evaluator,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> &[WeaknessSignature] {
        &self.selected
    }

    /// Bonus in centipawns for steering the game into `after`, whose raw
    /// mover-relative evaluation (from the engine's side) is `raw_eval`.
    pub fn bias_for(&self, after: &Board, raw_eval: i32) -> i32 {
        if self.selected.is_empty() {
            return 0;
        }
        let position = ContextFingerprint::of_position(after, &self.evaluator);
        let cap = BIAS_CAP_FRACTION
            * f64::from(raw_eval.abs())
            * (f64::from(self.level) / f64::from(MAX_LEVEL));

        let mut bonus: f64 = 0.0;
        for signature in &self.selected {
            if signature.confidence < CONFIDENCE_GATE {
                continue;
            }
            if signature.fingerprint.matches(&position) {
                bonus = bonus.max(cap * signature.confidence);
            }
        }
        bonus.round() as i32
    }
}
