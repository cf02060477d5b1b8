use chess::Board;
use chess_coach_engine::{
    CriticalityAnalyzer, DepthPlan, MoveOrderer, SearchCore, SearchDeadline, SearchProgress,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

const BENCH_FENS: &[(&str, &str)] = &[
    (
        "opening",
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    ),
    (
        "middlegame",
        "r1bq1rk1/pp2ppbp/2np1np1/8/2BNP3/2N1BP2/PPPQ2PP/R3K2R w KQ - 0 9",
    ),
    (
        "tactical",
        "rnbqkbnr/pppp1p1p/6p1/4p2Q/4P3/8/PPPP1PPP/RNB1KBNR w KQkq - 0 3",
    ),
    ("endgame", "8/5pk1/6p1/8/8/6P1/R4PK1/3r4 w - - 0 40"),
];

fn fixed_depth_search(c: &mut Criterion) {
    let core = SearchCore::default();
    let mut group = c.benchmark_group("search_fixed_depth");
    for (name, fen) in BENCH_FENS {
        let board = Board::from_str(fen).unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| {
                let progress = SearchProgress::default();
                let outcome = core.search(
                    black_box(&board),
                    DepthPlan {
                        max_depth: 3,
                        iterative: true,
                    },
                    SearchDeadline::new(Duration::from_secs(60)),
                    Arc::new(AtomicBool::new(false)),
                    None,
                    None,
                    &progress,
                );
                black_box(outcome)
            })
        });
    }
    group.finish();
}

fn move_ordering(c: &mut Criterion) {
    let orderer = MoveOrderer::default();
    let board =
        Board::from_str("r1bq1rk1/pp2ppbp/2np1np1/8/2BNP3/2N1BP2/PPPQ2PP/R3K2R w KQ - 0 9")
            .unwrap();
    c.bench_function("order_middlegame_moves", |b| {
        b.iter(|| black_box(orderer.order(black_box(&board))))
    });
}

fn criticality_scoring(c: &mut Criterion) {
    let analyzer = CriticalityAnalyzer::default();
    let board =
        Board::from_str("r1bq1rk1/pp2ppbp/2np1np1/8/2BNP3/2N1BP2/PPPQ2PP/R3K2R w KQ - 0 9")
            .unwrap();
    c.bench_function("criticality_middlegame", |b| {
        b.iter(|| black_box(analyzer.analyze(black_box(&board))))
    });
}

criterion_group!(
    benches,
    fixed_depth_search,
    move_ordering,
    criticality_scoring
);
criterion_main!(benches);
