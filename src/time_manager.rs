use crate::criticality::CriticalityReport;
use crate::evaluation::GamePhase;
use std::time::{Duration, Instant};
use tracing::trace;

/// Named time-control and depth-selection constants, indexed by difficulty
/// level (1..=8).
#[derive(Debug, Clone)]
pub struct TimeControlConfig {
    /// Base per-move allocation in milliseconds, per level
    pub base_time_ms: [u64; 8],
    /// Hard per-move ceiling in milliseconds, per level; never exceeded,
    /// bank or no bank
    pub hard_ceiling_ms: [u64; 8],
    /// Cap on the accumulated time bank
    pub bank_cap_ms: u64,
    /// Budget multiplier for critical positions
    pub critical_multiplier: f64,
    /// Budget multiplier for middlegame positions
    pub middlegame_multiplier: f64,
    /// Fixed search depth for levels 1..=3
    pub fixed_depth: [u8; 3],
    /// Iterative-deepening ceiling for levels 4..=8
    pub depth_ceiling: [u8; 5],
    /// Criticality score granting a +1 depth bonus
    pub depth_bonus_one_threshold: u8,
    /// Criticality score granting a +2 depth bonus
    pub depth_bonus_two_threshold: u8,
}

impl Default for TimeControlConfig {
    fn default() -> Self {
        Self {
            base_time_ms: [250, 350, 450, 600, 800, 1000, 1300, 1600],
            hard_ceiling_ms: [800, 1000, 1500, 2500, 3500, 5000, 7000, 9000],
            bank_cap_ms: 5000,
            critical_multiplier: 2.0,
            middlegame_multiplier: 1.5,
            fixed_depth: [2, 2, 3],
            depth_ceiling: [4, 5, 6, 7, 8],
            depth_bonus_one_threshold: 60,
            depth_bonus_two_threshold: 80,
        }
    }
}

/// Per-move time allocation. Created for a single move computation and
/// settled when it finishes.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    pub allotted_ms: u64,
    /// Portion of `allotted_ms` drawn from the time bank
    pub bank_draw_ms: u64,
    /// Caller-supplied fixed budget; skips bank accounting
    pub explicit: bool,
}

impl TimeBudget {
    /// A caller-fixed budget that bypasses the allocation formula.
    pub fn fixed(ms: u64) -> Self {
        Self {
            allotted_ms: ms,
            bank_draw_ms: 0,
            explicit: true,
        }
    }
}

/// How deep to search for a given level and position.
#[derive(Debug, Clone, Copy)]
pub struct DepthPlan {
    pub max_depth: u8,
    /// Iterative deepening from depth 1, or a single fixed-depth pass
    pub iterative: bool,
}

/// Deadline handed to the search core; cooperative, monotonic-clock based.
#[derive(Debug, Clone, Copy)]
pub struct SearchDeadline {
    start: Instant,
    limit: Duration,
}

impl SearchDeadline {
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.start.elapsed())
    }
}

/// Allocates per-move time budgets and adaptive depth plans.
///
/// Budget = base × (1 + complexity) × (critical ? 2 : 1) ×
/// (middlegame ? 1.5 : 1), capped at the level's hard ceiling. Unspent time
/// from fast moves accumulates in a bounded bank; critical moves may draw
/// from it, still never exceeding the ceiling.
#[derive(Debug, Clone, Default)]
pub struct TimeManager {
    config: TimeControlConfig,
    bank_ms: u64,
}

impl TimeManager {
    pub fn new(config: TimeControlConfig) -> Self {
        Self { config, bank_ms: 0 }
    }

    pub fn config(&self) -> &TimeControlConfig {
        &self.config
    }

    pub fn bank_ms(&self) -> u64 {
        self.bank_ms
    }

    /// Compute the budget for one move at `level` given the position's
    /// criticality report and game phase.
    pub fn allocate(&mut self, report: &CriticalityReport, phase: GamePhase, level: u8) -> TimeBudget {
        let idx = level_index(level);
        let ceiling = self.config.hard_ceiling_ms[idx];

        let complexity = f64::from(report.score) / 100.0;
        let mut ms = self.config.base_time_ms[idx] as f64 * (1.0 + complexity);
        if report.is_critical {
            ms *= self.config.critical_multiplier;
        }
        if phase == GamePhase::Middlegame {
            ms *= self.config.middlegame_multiplier;
        }
        let mut allotted = ms as u64;

        let mut bank_draw = 0;
        if report.is_critical && allotted < ceiling && self.bank_ms > 0 {
            bank_draw = self.bank_ms.min(ceiling - allotted);
            allotted += bank_draw;
            self.bank_ms -= bank_draw;
        }
        allotted = allotted.min(ceiling);

        trace!(
            difficulty = level,
            criticality = report.score,
            allotted_ms = allotted,
            bank_draw_ms = bank_draw,
            bank_ms = self.bank_ms,
            "time budget allocated"
        );

        TimeBudget {
            allotted_ms: allotted,
            bank_draw_ms: bank_draw,
            explicit: false,
        }
    }

    /// Settle a finished move: deposit unspent time into the bank.
    pub fn settle(&mut self, budget: &TimeBudget, spent_ms: u64) {
        if budget.explicit {
            return;
        }
        if spent_ms < budget.allotted_ms {
            let surplus = budget.allotted_ms - spent_ms;
            self.bank_ms = (self.bank_ms + surplus).min(self.config.bank_cap_ms);
            trace!(surplus_ms = surplus, bank_ms = self.bank_ms, "time bank deposit");
        }
    }

    /// Depth plan for `level`: fixed shallow depth at levels 1..=3,
    /// iterative deepening to a per-level ceiling above, with a +1/+2 bonus
    /// in critical positions.
    pub fn depth_plan(&self, level: u8, report: &CriticalityReport) -> DepthPlan {
        if level <= 3 {
            return DepthPlan {
                max_depth: self.config.fixed_depth[level_index(level)],
                iterative: false,
            };
        }
        let mut depth = self.config.depth_ceiling[level_index(level) - 3];
        if report.score >= self.config.depth_bonus_two_threshold {
            depth += 2;
        } else if report.score >= self.config.depth_bonus_one_threshold {
            depth += 1;
        }
        DepthPlan {
            max_depth: depth,
            iterative: true,
        }
    }
}

fn level_index(level: u8) -> usize {
    (level.clamp(1, 8) - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criticality::CriticalityAnalyzer;
    use chess::Board;
    use std::str::FromStr;

    fn quiet_report() -> CriticalityReport {
        CriticalityAnalyzer::default().analyze(&Board::default())
    }

    fn critical_report() -> CriticalityReport {
        // Mate threat plus check-laden position scores well above threshold
        let board = Board::from_str("6k1/5ppp/8/8/8/8/5q2/R5K1 w - - 0 1").unwrap();
        CriticalityAnalyzer::default().analyze(&board)
    }

    #[test]
    fn test_budget_never_exceeds_ceiling() {
        let mut manager = TimeManager::default();
        // Prime the bank to its cap
        let budget = TimeBudget {
            allotted_ms: 10_000,
            bank_draw_ms: 0,
            explicit: false,
        };
        manager.settle(&budget, 0);
        assert_eq!(manager.bank_ms(), manager.config().bank_cap_ms);

        let report = critical_report();
        for level in 1..=8u8 {
            let ceiling = manager.config().hard_ceiling_ms[(level - 1) as usize];
            let allocated = manager.allocate(&report, GamePhase::Middlegame, level);
            assert!(
                allocated.allotted_ms <= ceiling,
                "level {} exceeded its ceiling",
                level
            );
        }
    }

    #[test]
    fn test_critical_position_gets_more_time() {
        let mut manager = TimeManager::default();
        let quiet = manager.allocate(&quiet_report(), GamePhase::Opening, 5);
        let mut manager = TimeManager::default();
        let critical = manager.allocate(&critical_report(), GamePhase::Opening, 5);
        assert!(critical.allotted_ms > quiet.allotted_ms);
    }

    #[test]
    fn test_middlegame_multiplier_applies() {
        let report = quiet_report();
        let mut manager = TimeManager::default();
        let opening = manager.allocate(&report, GamePhase::Opening, 4);
        let mut manager = TimeManager::default();
        let middlegame = manager.allocate(&report, GamePhase::Middlegame, 4);
        assert!(middlegame.allotted_ms > opening.allotted_ms);
    }

    #[test]
    fn test_bank_accumulates_and_is_drawn() {
        let mut manager = TimeManager::default();
        let budget = manager.allocate(&quiet_report(), GamePhase::Opening, 5);
        manager.settle(&budget, 10);
        let banked = manager.bank_ms();
        assert!(banked > 0);

        // A critical move draws from the bank
        let critical = manager.allocate(&critical_report(), GamePhase::Opening, 5);
        assert!(critical.bank_draw_ms > 0);
        assert!(manager.bank_ms() < banked);
    }

    #[test]
    fn test_quiet_moves_do_not_draw_bank() {
        let mut manager = TimeManager::default();
        let budget = manager.allocate(&quiet_report(), GamePhase::Opening, 5);
        manager.settle(&budget, 10);
        let banked = manager.bank_ms();

        let quiet = manager.allocate(&quiet_report(), GamePhase::Opening, 5);
        assert_eq!(quiet.bank_draw_ms, 0);
        assert_eq!(manager.bank_ms(), banked);
    }

    #[test]
    fn test_bank_is_capped() {
        let mut manager = TimeManager::default();
        for _ in 0..50 {
            let budget = manager.allocate(&quiet_report(), GamePhase::Opening, 8);
            manager.settle(&budget, 0);
        }
        assert_eq!(manager.bank_ms(), manager.config().bank_cap_ms);
    }

    #[test]
    fn test_fixed_depth_at_low_levels() {
        let manager = TimeManager::default();
        let report = quiet_report();
        for level in 1..=3u8 {
            let plan = manager.depth_plan(level, &report);
            assert!(!plan.iterative);
            assert!(plan.max_depth <= 3);
        }
    }

    #[test]
    fn test_depth_bonus_in_critical_positions() {
        let manager = TimeManager::default();
        let quiet_plan = manager.depth_plan(6, &quiet_report());
        let critical = critical_report();
        let critical_plan = manager.depth_plan(6, &critical);
        assert!(critical_plan.iterative);
        if critical.score >= manager.config().depth_bonus_one_threshold {
            assert!(critical_plan.max_depth > quiet_plan.max_depth);
        }
    }

    #[test]
    fn test_explicit_budget_skips_bank() {
        let mut manager = TimeManager::default();
        let budget = TimeBudget::fixed(500);
        manager.settle(&budget, 10);
        assert_eq!(manager.bank_ms(), 0);
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = SearchDeadline::new(Duration::from_millis(0));
        assert!(deadline.expired());
        let deadline = SearchDeadline::new(Duration::from_secs(60));
        assert!(!deadline.expired());
        assert!(deadline.remaining() > Duration::from_secs(59));
    }
}
