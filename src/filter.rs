use chrono::{DateTime, Utc};

pub const DEFAULT_POST_RATE: f64 = 30.0;
pub const DEFAULT_COMMENT_RATE: f64 = 3.0;

/// Score required per hour of age, for posts and for their comments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub post_rate: f64,
    pub comment_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            post_rate: DEFAULT_POST_RATE,
            comment_rate: DEFAULT_COMMENT_RATE,
        }
    }
}

/// Minimum score for content of the given age. No floor: fresh content needs ~0.
pub fn minimum_score(age_hours: f64, rate: f64) -> f64 {
    rate * age_hours
}

pub fn passes(score: i64, age_hours: f64, rate: f64) -> bool {
    score as f64 >= minimum_score(age_hours, rate)
}

/// Hours elapsed between `created_at` and `now`, fractional.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - created_at).num_milliseconds() as f64 / 3_600_000.0
}
