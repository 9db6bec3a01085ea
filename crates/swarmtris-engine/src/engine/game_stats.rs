/// Score values for line clears.
///
/// Index corresponds to number of lines cleared by one lock:
/// - 0 lines: 0 points
/// - 1 line: 100 points
/// - 2 lines: 300 points
/// - 3 lines: 500 points
/// - 4 lines: 800 points
pub const SCORE_TABLE: [usize; 5] = [0, 100, 300, 500, 800];

/// Points awarded for clearing `lines` rows with one lock.
///
/// A single piece spans at most four rows, so larger counts are scored as four.
#[must_use]
pub const fn line_clear_score(lines: usize) -> usize {
    let index = if lines < SCORE_TABLE.len() {
        lines
    } else {
        SCORE_TABLE.len() - 1
    };
    SCORE_TABLE[index]
}

/// Cumulative statistics for one game.
///
/// # Example
///
/// ```
/// use swarmtris_engine::GameStats;
///
/// let mut stats = GameStats::new();
/// assert_eq!(stats.record_lock(4), 800);
/// assert_eq!(stats.record_lock(0), 0);
///
/// assert_eq!(stats.score(), 800);
/// assert_eq!(stats.pieces_locked(), 2);
/// assert_eq!(stats.line_cleared_counter()[4], 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GameStats {
    score: usize,
    pieces_locked: usize,
    lines_cleared: usize,
    line_cleared_counter: [usize; 5],
}

impl GameStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            score: 0,
            pieces_locked: 0,
            lines_cleared: 0,
            line_cleared_counter: [0; 5],
        }
    }

    #[must_use]
    pub const fn score(&self) -> usize {
        self.score
    }

    #[must_use]
    pub const fn pieces_locked(&self) -> usize {
        self.pieces_locked
    }

    #[must_use]
    pub const fn lines_cleared(&self) -> usize {
        self.lines_cleared
    }

    /// Histogram of locks by lines cleared (`[0]` counts locks that cleared nothing).
    #[must_use]
    pub const fn line_cleared_counter(&self) -> &[usize; 5] {
        &self.line_cleared_counter
    }

    /// Records one lock that cleared `cleared_lines` rows and returns the points awarded.
    pub const fn record_lock(&mut self, cleared_lines: usize) -> usize {
        let points = line_clear_score(cleared_lines);
        self.pieces_locked += 1;
        self.lines_cleared += cleared_lines;
        let bucket = if cleared_lines < self.line_cleared_counter.len() {
            cleared_lines
        } else {
            self.line_cleared_counter.len() - 1
        };
        self.line_cleared_counter[bucket] += 1;
        self.score += points;
        points
    }
}
