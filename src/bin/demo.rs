use chess_coach_engine::{CoachEngine, MoveRequest};
use std::time::Instant;

fn main() {
    tracing_subscriber::fmt::init();

    println!("Chess Coach Engine Demo");
    println!("=======================");

    let mut engine = CoachEngine::new();

    // Sample positions across game phases
    let positions = vec![
        (
            "Starting position",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        ),
        (
            "Open Sicilian middlegame",
            "r1bq1rk1/pp2ppbp/2np1np1/8/2BNP3/2N1BP2/PPPQ2PP/R3K2R w KQ - 0 9",
        ),
        (
            "Scholar's mate trap",
            "rnbqkbnr/pppp1p1p/6p1/4p2Q/4P3/8/PPPP1PPP/RNB1KBNR w KQkq - 0 3",
        ),
        ("Rook endgame", "8/5pk1/6p1/8/8/6P1/R4PK1/3r4 w - - 0 40"),
    ];

    for level in [2u8, 5, 8] {
        println!("\n--- Difficulty level {} ---", level);
        for (name, fen) in &positions {
            let request = MoveRequest {
                fen: fen.to_string(),
                depth_hint: None,
                time_budget_ms: None,
                level,
                signatures: Vec::new(),
            };

            let started = Instant::now();
            match engine.select_move(&request) {
                Ok(response) => {
                    println!(
                        "{:26} {:6} depth {} | {:>8} nodes | {:>6} cp | {:>5} ms{}",
                        name,
                        response.chosen_move.to_string(),
                        response.depth_reached,
                        response.nodes_searched,
                        response.evaluation_cp,
                        started.elapsed().as_millis(),
                        if response.timed_out { " (timed out)" } else { "" },
                    );
                }
                Err(e) => println!("{:26} error: {}", name, e),
            }
        }
    }
}
