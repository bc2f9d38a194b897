//! Pure scoring rules: correctness + remaining time + streak to points.

use crate::questions::model::Difficulty;

/// Points granted per full second left on the clock.
pub const TIME_BONUS_PER_SECOND: f64 = 2.0;

/// Streak multiplier step, in tenths (each consecutive correct answer adds
/// one tenth to the multiplier).
const STREAK_STEP_TENTHS: u32 = 1;

/// Compute the points for one answer.
///
/// Deterministic and side-effect free so disputed scores can be reproduced
/// from the recorded inputs. An incorrect answer is always worth exactly 0;
/// a correct one earns the difficulty base plus a time bonus, scaled by the
/// streak held *before* this answer:
///
/// `floor((base + floor(time_remaining * 2)) * (1 + streak / 10))`
///
/// The multiplication is done in integer arithmetic (`(10 + streak) / 10`)
/// to keep results exactly reproducible across platforms.
pub fn score(correct: bool, time_remaining_secs: f64, streak: u32, difficulty: Difficulty) -> u32 {
    if !correct {
        return 0;
    }

    let time_bonus = (time_remaining_secs.max(0.0) * TIME_BONUS_PER_SECOND).floor() as u32;
    let raw = difficulty.base_points() + time_bonus;

    raw * (10 + streak * STREAK_STEP_TENTHS) / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incorrect_is_always_zero() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            for streak in [0, 3, 10] {
                assert_eq!(score(false, 30.0, streak, difficulty), 0);
            }
        }
    }

    #[test]
    fn easy_answer_with_fifteen_seconds_left_and_no_streak() {
        // base 50 + 15s * 2 = 80, multiplier 1.0
        assert_eq!(score(true, 15.0, 0, Difficulty::Easy), 80);
    }

    #[test]
    fn streak_scales_in_exact_tenths() {
        // (100 + 0) * 1.3 = 130
        assert_eq!(score(true, 0.0, 3, Difficulty::Hard), 130);
        // (75 + 10) * 1.1 = 93.5 floored to 93
        assert_eq!(score(true, 5.0, 1, Difficulty::Medium), 93);
    }

    #[test]
    fn monotonic_in_time_remaining_and_streak() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let mut previous = 0;
            for tenth in 0..300 {
                let points = score(true, f64::from(tenth) / 10.0, 0, difficulty);
                assert!(points >= previous);
                previous = points;
            }

            let mut previous = 0;
            for streak in 0..50 {
                let points = score(true, 12.0, streak, difficulty);
                assert!(points >= previous);
                previous = points;
            }
        }
    }

    #[test]
    fn hard_beats_medium_beats_easy() {
        let easy = score(true, 10.0, 0, Difficulty::Easy);
        let medium = score(true, 10.0, 0, Difficulty::Medium);
        let hard = score(true, 10.0, 0, Difficulty::Hard);
        assert!(easy < medium && medium < hard);
    }

    #[test]
    fn negative_time_remaining_is_treated_as_zero() {
        assert_eq!(
            score(true, -3.0, 0, Difficulty::Easy),
            Difficulty::Easy.base_points()
        );
    }
}
