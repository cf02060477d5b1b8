use chess::{Board, Color, Piece, Square};
use serde::{Deserialize, Serialize};

/// Game phase detection for evaluation tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    Opening,
    Middlegame,
    Endgame,
}

/// Standard centipawn values for chess pieces
#[derive(Debug, Clone, Copy)]
pub struct PieceValues {
    pub pawn: i32,
    pub knight: i32,
    pub bishop: i32,
    pub rook: i32,
    pub queen: i32,
    pub king: i32,
}

impl Default for PieceValues {
    fn default() -> Self {
        Self {
            pawn: 100,
            knight: 320,
            bishop: 330,
            rook: 500,
            queen: 900,
            king: 0,
        }
    }
}

impl PieceValues {
    pub fn value_of(&self, piece: Piece) -> i32 {
        match piece {
            Piece::Pawn => self.pawn,
            Piece::Knight => self.knight,
            Piece::Bishop => self.bishop,
            Piece::Rook => self.rook,
            Piece::Queen => self.queen,
            Piece::King => self.king,
        }
    }
}

/// Named evaluation weights, all in centipawns.
///
/// Each term is tunable independently; the defaults are the documented
/// values and make no claim of joint optimality.
#[derive(Debug, Clone)]
pub struct EvalWeights {
    pub piece_values: PieceValues,
    /// Bonus per own piece occupying d4/d5/e4/e5
    pub center_control_bonus: i32,
    /// Penalty per minor piece still on its back rank
    pub development_penalty: i32,
    /// Bonus for a king standing on a castled square
    pub castle_bonus: i32,
    /// Fixed penalty for a knight on a rim square (a/h files, ranks 3-6)
    pub rim_knight_penalty: i32,
    /// Penalty for having traded the queen while above the endgame threshold
    pub early_queen_trade_penalty: i32,
    /// Fixed penalty for the side to move being in check
    pub in_check_penalty: i32,
    /// Penalty per rank of king exposure outside the endgame
    pub king_exposure_penalty: i32,
    /// Total non-king material (both sides) at or below which the
    /// position counts as an endgame
    pub endgame_material_threshold: i32,
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            piece_values: PieceValues::default(),
            center_control_bonus: 10,
            development_penalty: 15,
            castle_bonus: 30,
            rim_knight_penalty: 25,
            early_queen_trade_penalty: 40,
            in_check_penalty: 50,
            king_exposure_penalty: 12,
            endgame_material_threshold: 2600,
        }
    }
}

// Piece-square tables, written from White's point of view with rank 8 first.
// Index for a White piece: (7 - rank) * 8 + file; mirrored for Black.
#[rustfmt::skip]
const PAWN_TABLE: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 27, 27, 10,  5,  5,
     0,  0,  0, 25, 25,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-25,-25, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_TABLE: [i32; 64] = [
   -50,-40,-30,-30,-30,-30,-40,-50,
   -40,-20,  0,  0,  0,  0,-20,-40,
   -30,  0, 10, 15, 15, 10,  0,-30,
   -30,  5, 15, 20, 20, 15,  5,-30,
   -30,  0, 15, 20, 20, 15,  0,-30,
   -30,  5, 10, 15, 15, 10,  5,-30,
   -40,-20,  0,  5,  5,  0,-20,-40,
   -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const BISHOP_TABLE: [i32; 64] = [
   -20,-10,-10,-10,-10,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5, 10, 10,  5,  0,-10,
   -10,  5,  5, 10, 10,  5,  5,-10,
   -10,  0, 10, 10, 10, 10,  0,-10,
   -10, 10, 10, 10, 10, 10, 10,-10,
   -10,  5,  0,  0,  0,  0,  5,-10,
   -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const ROOK_TABLE: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_TABLE: [i32; 64] = [
   -20,-10,-10, -5, -5,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
     0,  0,  5,  5,  5,  5,  0, -5,
   -10,  5,  5,  5,  5,  5,  0,-10,
   -10,  0,  5,  0,  0,  0,  0,-10,
   -20,-10,-10, -5, -5,-10,-10,-20,
];

// The king hides in the middlegame and fights in the endgame.
#[rustfmt::skip]
const KING_MIDDLEGAME_TABLE: [i32; 64] = [
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -20,-30,-30,-40,-40,-30,-30,-20,
   -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20,
];

#[rustfmt::skip]
const KING_ENDGAME_TABLE: [i32; 64] = [
   -50,-40,-30,-20,-20,-30,-40,-50,
   -30,-20,-10,  0,  0,-10,-20,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-30,  0,  0,  0,  0,-30,-30,
   -50,-30,-30,-30,-30,-30,-50,-50,
];

const CENTER_SQUARES: [Square; 4] = [Square::D4, Square::D5, Square::E4, Square::E5];

/// Pure static position evaluator.
///
/// `evaluate` is deterministic, side-effect free, and returns centipawns
/// from the side to move's perspective: mirroring the position and swapping
/// colors yields the same mover-relative score.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: EvalWeights,
}

impl Evaluator {
    pub fn new(weights: EvalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EvalWeights {
        &self.weights
    }

    /// Evaluate a position in centipawns from the side to move's perspective.
    pub fn evaluate(&self, board: &Board) -> i32 {
        let diff = self.evaluate_for(board, Color::White) - self.evaluate_for(board, Color::Black);
        let mut score = if board.side_to_move() == Color::White {
            diff
        } else {
            -diff
        };
        // The in-check penalty belongs to the mover alone
        if board.checkers().popcnt() > 0 {
            score -= self.weights.in_check_penalty;
        }
        score
    }

    /// Total non-king material on the board, both sides, in centipawns.
    pub fn total_material(&self, board: &Board) -> i32 {
        let mut total = 0;
        for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            total += board.pieces(piece).popcnt() as i32 * self.weights.piece_values.value_of(piece);
        }
        total
    }

    /// Material balance in centipawns from White's perspective.
    pub fn material_balance(&self, board: &Board) -> i32 {
        let mut balance = 0;
        for piece in [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            let value = self.weights.piece_values.value_of(piece);
            let white = (board.pieces(piece) & board.color_combined(Color::White)).popcnt() as i32;
            let black = (board.pieces(piece) & board.color_combined(Color::Black)).popcnt() as i32;
            balance += (white - black) * value;
        }
        balance
    }

    /// Game phase from non-pawn material, mirroring the classic boundaries.
    pub fn game_phase(&self, board: &Board) -> GamePhase {
        let mut non_pawn = 0;
        for color in [Color::White, Color::Black] {
            non_pawn += (board.pieces(Piece::Queen) & board.color_combined(color)).popcnt() * 9;
            non_pawn += (board.pieces(Piece::Rook) & board.color_combined(color)).popcnt() * 5;
            non_pawn += (board.pieces(Piece::Bishop) & board.color_combined(color)).popcnt() * 3;
            non_pawn += (board.pieces(Piece::Knight) & board.color_combined(color)).popcnt() * 3;
        }

        if non_pawn >= 60 {
            GamePhase::Opening
        } else if non_pawn >= 20 {
            GamePhase::Middlegame
        } else {
            GamePhase::Endgame
        }
    }

    pub fn is_endgame(&self, board: &Board) -> bool {
        self.total_material(board) <= self.weights.endgame_material_threshold
    }

    fn evaluate_for(&self, board: &Board, color: Color) -> i32 {
        let endgame = self.is_endgame(board);
        let mut score = 0;

        let own = board.color_combined(color);
        for square in *own {
            let piece = match board.piece_on(square) {
                Some(p) => p,
                None => continue,
            };
            score += self.weights.piece_values.value_of(piece);
            score += self.piece_square_bonus(piece, square, color, endgame);

            match piece {
                Piece::Knight => {
                    if is_rim_square(square) {
                        score -= self.weights.rim_knight_penalty;
                    }
                    if on_back_rank(square, color) {
                        score -= self.weights.development_penalty;
                    }
                }
                Piece::Bishop => {
                    if on_back_rank(square, color) {
                        score -= self.weights.development_penalty;
                    }
                }
                _ => {}
            }
        }

        // Center occupation
        for sq in CENTER_SQUARES {
            if board.color_on(sq) == Some(color) {
                score += self.weights.center_control_bonus;
            }
        }

        let king_square = board.king_square(color);

        // King safety matters while there is still attacking material around
        if !endgame {
            score -= self.king_exposure(king_square, color) * self.weights.king_exposure_penalty;
            if is_castled_square(king_square, color) {
                score += self.weights.castle_bonus;
            }
            // A queenless side above the endgame threshold traded too early
            if (board.pieces(Piece::Queen) & board.color_combined(color)).popcnt() == 0 {
                score -= self.weights.early_queen_trade_penalty;
            }
        }

        score
    }

    fn piece_square_bonus(&self, piece: Piece, square: Square, color: Color, endgame: bool) -> i32 {
        let rank = square.get_rank().to_index();
        let file = square.get_file().to_index();
        let index = match color {
            Color::White => (7 - rank) * 8 + file,
            Color::Black => rank * 8 + file,
        };

        match piece {
            Piece::Pawn => PAWN_TABLE[index],
            Piece::Knight => KNIGHT_TABLE[index],
            Piece::Bishop => BISHOP_TABLE[index],
            Piece::Rook => ROOK_TABLE[index],
            Piece::Queen => QUEEN_TABLE[index],
            Piece::King => {
                if endgame {
                    KING_ENDGAME_TABLE[index]
                } else {
                    KING_MIDDLEGAME_TABLE[index]
                }
            }
        }
    }

    /// Ranks the king has strayed from its back rank.
    fn king_exposure(&self, king_square: Square, color: Color) -> i32 {
        let rank = king_square.get_rank().to_index() as i32;
        match color {
            Color::White => rank,
            Color::Black => 7 - rank,
        }
    }
}

fn is_rim_square(square: Square) -> bool {
    let file = square.get_file().to_index();
    let rank = square.get_rank().to_index();
    (file == 0 || file == 7) && (2..=5).contains(&rank)
}

fn on_back_rank(square: Square, color: Color) -> bool {
    let rank = square.get_rank().to_index();
    match color {
        Color::White => rank == 0,
        Color::Black => rank == 7,
    }
}

fn is_castled_square(king_square: Square, color: Color) -> bool {
    match color {
        Color::White => king_square == Square::G1 || king_square == Square::C1,
        Color::Black => king_square == Square::G8 || king_square == Square::C8,
    }
}
