use crate::evaluation::{Evaluator, GamePhase};
use crate::ordering::count_attackers;
use chess::{Board, BoardStatus, Color, MoveGen, Piece};

/// Named weights for the seven criticality factors.
///
/// Every factor contributes a non-negative amount before the final clamp,
/// so adding a qualifying tactical feature to a position never lowers the
/// score.
#[derive(Debug, Clone)]
pub struct CriticalityWeights {
    /// Flat contribution when the side to move is in check
    pub check_weight: i32,
    /// Contribution per available capture
    pub capture_weight: i32,
    /// Cap on the total capture contribution
    pub capture_cap: i32,
    /// Contribution per 100cp of material imbalance
    pub imbalance_weight: i32,
    /// Cap on the imbalance contribution
    pub imbalance_cap: i32,
    /// Flat contribution when few pieces remain (endgame precision)
    pub endgame_weight: i32,
    /// Piece count at or below which the endgame contribution applies
    pub endgame_piece_count: u32,
    /// Flat contribution when a mate-in-one exists for the side to move
    pub mate_threat_weight: i32,
    /// Contribution per hanging piece on the board
    pub hanging_weight: i32,
    /// Cap on the hanging-piece contribution
    pub hanging_cap: i32,
    /// Scale for the forcing-move density ratio (checks+captures / moves)
    pub forcing_density_weight: i32,
    /// Score at or above which a position counts as critical
    pub critical_threshold: u8,
}

impl Default for CriticalityWeights {
    fn default() -> Self {
        Self {
            check_weight: 25,
            capture_weight: 4,
            capture_cap: 20,
            imbalance_weight: 3,
            imbalance_cap: 15,
            endgame_weight: 10,
            endgame_piece_count: 12,
            mate_threat_weight: 30,
            hanging_weight: 8,
            hanging_cap: 16,
            forcing_density_weight: 20,
            critical_threshold: 60,
        }
    }
}

/// Factor breakdown behind a criticality score.
#[derive(Debug, Clone, Copy)]
pub struct CriticalityReport {
    /// Combined score, clamped to 0..=100
    pub score: u8,
    pub in_check: bool,
    pub captures_available: u32,
    pub material_imbalance_cp: i32,
    pub total_pieces: u32,
    pub mate_threat: bool,
    pub hanging_pieces: u32,
    /// Checks plus captures as a fraction of all legal moves
    pub forcing_density: f64,
    pub phase: GamePhase,
    pub is_critical: bool,
}

/// Scores how tactically consequential a position is, 0–100.
#[derive(Debug, Clone, Default)]
pub struct CriticalityAnalyzer {
    weights: CriticalityWeights,
    evaluator: Evaluator,
}

impl CriticalityAnalyzer {
    pub fn new(weights: CriticalityWeights, evaluator: Evaluator) -> Self {
        Self { weights, evaluator }
    }

    pub fn weights(&self) -> &CriticalityWeights {
        &self.weights
    }

    pub fn analyze(&self, board: &Board) -> CriticalityReport {
        let w = &self.weights;

        let in_check = board.checkers().popcnt() > 0;

        let mut total_moves = 0u32;
        let mut captures = 0u32;
        let mut checks = 0u32;
        let mut mate_threat = false;
        for mv in MoveGen::new_legal(board) {
            total_moves += 1;
            if board.piece_on(mv.get_dest()).is_some() {
                captures += 1;
            }
            let after = board.make_move_new(mv);
            if after.checkers().popcnt() > 0 {
                checks += 1;
            }
            if after.status() == BoardStatus::Checkmate {
                mate_threat = true;
            }
        }

        let imbalance = self.evaluator.material_balance(board).abs();
        let total_pieces = board.combined().popcnt();
        let hanging = self.count_hanging_pieces(board);
        let forcing_density = if total_moves > 0 {
            f64::from(captures + checks) / f64::from(total_moves)
        } else {
            0.0
        };

        let mut score = 0i32;
        if in_check {
            score += w.check_weight;
        }
        score += (captures as i32 * w.capture_weight).min(w.capture_cap);
        score += (imbalance / 100 * w.imbalance_weight).min(w.imbalance_cap);
        if total_pieces <= w.endgame_piece_count {
            score += w.endgame_weight;
        }
        if mate_threat {
            score += w.mate_threat_weight;
        }
        score += (hanging as i32 * w.hanging_weight).min(w.hanging_cap);
        score += (forcing_density * f64::from(w.forcing_density_weight)) as i32;

        let score = score.clamp(0, 100) as u8;

        CriticalityReport {
            score,
            in_check,
            captures_available: captures,
            material_imbalance_cp: imbalance,
            total_pieces,
            mate_threat,
            hanging_pieces: hanging,
            forcing_density,
            phase: self.evaluator.game_phase(board),
            is_critical: score >= w.critical_threshold,
        }
    }

    /// Pieces of either color that are attacked and undefended.
    fn count_hanging_pieces(&self, board: &Board) -> u32 {
        let mut hanging = 0;
        for color in [Color::White, Color::Black] {
            for piece in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight, Piece::Pawn] {
                let own = board.pieces(piece) & board.color_combined(color);
                for square in own {
                    if count_attackers(board, square, !color) > 0
                        && count_attackers(board, square, color) == 0
                    {
                        hanging += 1;
                    }
                }
            }
        }
        hanging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_quiet_opening_scores_low() {
        let analyzer = CriticalityAnalyzer::default();
        let report = analyzer.analyze(&Board::default());
        assert!(report.score < 30, "starting position scored {}", report.score);
        assert!(!report.is_critical);
        assert!(!report.in_check);
        assert!(!report.mate_threat);
    }

    #[test]
    fn test_check_raises_score() {
        let analyzer = CriticalityAnalyzer::default();
        // Same material, one position with the mover in check
        let quiet = Board::from_str("4k3/8/8/8/8/q7/5PPP/6K1 w - - 0 1").unwrap();
        let checked = Board::from_str("4k3/8/8/8/8/8/5PPP/q5K1 w - - 0 1").unwrap();
        let quiet_report = analyzer.analyze(&quiet);
        let checked_report = analyzer.analyze(&checked);
        assert!(checked_report.in_check);
        assert!(checked_report.score >= quiet_report.score);
    }

    #[test]
    fn test_capture_opportunity_never_lowers_score() {
        let analyzer = CriticalityAnalyzer::default();
        // Identical except a black pawn appears on d5 where e4 can take it
        let without = Board::from_str("rnbqkbnr/ppp1pppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
            .unwrap();
        let with = Board::from_str("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
            .unwrap();
        let a = analyzer.analyze(&without);
        let b = analyzer.analyze(&with);
        assert!(b.captures_available > a.captures_available);
        assert!(b.score >= a.score);
    }

    #[test]
    fn test_mate_threat_detected() {
        let analyzer = CriticalityAnalyzer::default();
        // White mates with Ra8#
        let board = Board::from_str("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let report = analyzer.analyze(&board);
        assert!(report.mate_threat);
        assert!(report.score >= analyzer.weights().mate_threat_weight as u8);
    }

    #[test]
    fn test_endgame_piece_count_factor() {
        let analyzer = CriticalityAnalyzer::default();
        let endgame = Board::from_str("8/5k2/8/8/3RK3/8/8/8 w - - 0 1").unwrap();
        let report = analyzer.analyze(&endgame);
        assert!(report.total_pieces <= analyzer.weights().endgame_piece_count);
    }

    #[test]
    fn test_hanging_piece_counted() {
        let analyzer = CriticalityAnalyzer::default();
        // Black rook on a5 attacked by the b4 pawn, undefended
        let board = Board::from_str("4k3/8/8/r7/1P6/8/8/4K3 w - - 0 1").unwrap();
        let report = analyzer.analyze(&board);
        assert!(report.hanging_pieces >= 1);
    }

    #[test]
    fn test_score_stays_in_range() {
        let analyzer = CriticalityAnalyzer::default();
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r1bqk2r/pppp1ppp/2n2n2/2b1p3/2B1P3/3P1N2/PPP2PPP/RNBQK2R w KQkq - 0 4",
            "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1",
            "4k3/8/8/8/8/8/q4PPP/6K1 w - - 0 1",
        ];
        for fen in fens {
            let report = analyzer.analyze(&Board::from_str(fen).unwrap());
            assert!(report.score <= 100);
        }
    }
}
