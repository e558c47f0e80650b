//! Point scoring
//!
//! Converts a canonical day into points. Pure: the result depends only on the
//! day and the policy.
//! - Step points: cumulative tiers, inclusive thresholds
//! - Activity points: duration weighted by heart-rate zone, per activity type

use crate::config::ScoringPolicy;
use crate::error::ScoreError;
use crate::types::{ActivityRecord, ActivityType, DaySummary, PointBreakdown};

/// Score a day under the given policy
pub fn score(day: &DaySummary, policy: &ScoringPolicy) -> Result<PointBreakdown, ScoreError> {
    let step_points = step_points(day.step_count, policy);

    let mut activity_points = 0.0;
    for activity in &day.activities {
        activity_points += points_for_activity(activity, policy)?;
    }

    Ok(PointBreakdown {
        step_points,
        activity_points,
        total: step_points as f64 + activity_points,
    })
}

/// Sum of the points of every tier whose threshold is reached
pub fn step_points(step_count: u32, policy: &ScoringPolicy) -> u32 {
    policy
        .step_tiers
        .iter()
        .filter(|tier| step_count >= tier.threshold)
        .fold(0u32, |sum, tier| sum.saturating_add(tier.points))
}

/// Points contributed by one activity
pub fn points_for_activity(
    activity: &ActivityRecord,
    policy: &ScoringPolicy,
) -> Result<f64, ScoreError> {
    if !activity.duration_minutes.is_finite() || activity.duration_minutes < 0.0 {
        return Err(ScoreError::Validation(format!(
            "duration must be a non-negative number, got {}",
            activity.duration_minutes
        )));
    }
    if activity.avg_heart_rate == Some(0) {
        return Err(ScoreError::Validation(
            "average heart rate must be positive".to_string(),
        ));
    }

    let zones = match activity.activity_type {
        ActivityType::Cardio => &policy.cardio,
        ActivityType::StrengthTraining => &policy.strength,
        ActivityType::Other => return Ok(0.0),
    };

    Ok(activity.duration_minutes * zones.weight_for(activity.avg_heart_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeartRateZones, HrZone, StepTier};
    use chrono::NaiveDate;

    fn day(steps: u32, activities: Vec<ActivityRecord>) -> DaySummary {
        DaySummary {
            date: NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(),
            step_count: steps,
            activities,
        }
    }

    #[test]
    fn test_step_thresholds_inclusive() {
        let policy = ScoringPolicy::default();
        assert_eq!(score(&day(0, vec![]), &policy).unwrap().step_points, 0);
        assert_eq!(score(&day(6_999, vec![]), &policy).unwrap().step_points, 0);
        assert_eq!(score(&day(7_000, vec![]), &policy).unwrap().step_points, 3);
        assert_eq!(score(&day(9_999, vec![]), &policy).unwrap().step_points, 3);
        assert_eq!(score(&day(10_000, vec![]), &policy).unwrap().step_points, 5);
        assert_eq!(score(&day(12_499, vec![]), &policy).unwrap().step_points, 5);
        assert_eq!(score(&day(12_500, vec![]), &policy).unwrap().step_points, 8);
        assert_eq!(score(&day(40_000, vec![]), &policy).unwrap().step_points, 8);
    }

    #[test]
    fn test_step_points_saturate() {
        let mut policy = ScoringPolicy::default();
        policy.step_tiers = vec![
            StepTier { threshold: 100, points: u32::MAX },
            StepTier { threshold: 200, points: 5 },
        ];
        assert_eq!(step_points(500, &policy), u32::MAX);
    }

    #[test]
    fn test_custom_weight_scales_by_minutes() {
        let mut policy = ScoringPolicy::default();
        policy.cardio = HeartRateZones {
            zones: vec![
                HrZone { min_bpm: 0, weight: 1.0 },
                HrZone { min_bpm: 130, weight: 1.5 },
            ],
            no_heart_rate_weight: 1.0,
        };

        let breakdown = score(
            &day(10_500, vec![ActivityRecord::new(ActivityType::Cardio, 30.0, Some(140))]),
            &policy,
        )
        .unwrap();

        assert_eq!(breakdown.step_points, 5);
        assert_eq!(breakdown.activity_points, 45.0);
        assert_eq!(breakdown.total, 50.0);
    }

    #[test]
    fn test_default_policy_matches_thirty_minute_rates() {
        let policy = ScoringPolicy::default();

        let hard = ActivityRecord::new(ActivityType::Cardio, 30.0, Some(125));
        let easy = ActivityRecord::new(ActivityType::Cardio, 30.0, Some(100));
        let lift = ActivityRecord::new(ActivityType::StrengthTraining, 60.0, Some(95));

        assert!((points_for_activity(&hard, &policy).unwrap() - 8.0).abs() < 1e-9);
        assert!((points_for_activity(&easy, &policy).unwrap() - 5.0).abs() < 1e-9);
        assert!((points_for_activity(&lift, &policy).unwrap() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_heart_rate_still_scores() {
        let policy = ScoringPolicy::default();
        let activity = ActivityRecord::new(ActivityType::Cardio, 45.0, None);
        assert!(points_for_activity(&activity, &policy).unwrap() > 0.0);
    }

    #[test]
    fn test_other_activities_score_zero() {
        let policy = ScoringPolicy::default();
        let breakdown = score(
            &day(0, vec![ActivityRecord::new(ActivityType::Other, 90.0, Some(150))]),
            &policy,
        )
        .unwrap();
        assert_eq!(breakdown, PointBreakdown::zero());
    }

    #[test]
    fn test_heart_rate_monotonicity() {
        let policy = ScoringPolicy::default();
        let mut previous = 0.0;
        for hr in 30..=220 {
            let activity = ActivityRecord::new(ActivityType::Cardio, 40.0, Some(hr));
            let points = points_for_activity(&activity, &policy).unwrap();
            assert!(points >= previous, "points dropped at {hr} bpm");
            previous = points;
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let policy = ScoringPolicy::default();

        let negative = day(0, vec![ActivityRecord::new(ActivityType::Cardio, -5.0, Some(120))]);
        assert!(matches!(score(&negative, &policy), Err(ScoreError::Validation(_))));

        let nan = day(0, vec![ActivityRecord::new(ActivityType::Cardio, f64::NAN, None)]);
        assert!(score(&nan, &policy).is_err());

        let zero_hr = day(0, vec![ActivityRecord::new(ActivityType::Cardio, 30.0, Some(0))]);
        assert!(score(&zero_hr, &policy).is_err());
    }

    #[test]
    fn test_score_is_deterministic() {
        let policy = ScoringPolicy::default();
        let summary = day(
            11_000,
            vec![
                ActivityRecord::new(ActivityType::StrengthTraining, 50.0, Some(100)),
                ActivityRecord::new(ActivityType::Cardio, 25.0, None),
            ],
        );

        let first = score(&summary, &policy).unwrap();
        let _ = score(&day(3, vec![]), &policy).unwrap();
        let second = score(&summary, &policy).unwrap();
        assert_eq!(first, second);
    }
}
