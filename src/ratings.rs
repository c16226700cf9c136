//! Rating aggregation over a business's review set. Pure functions of the
//! reviews passed in; nothing here touches the store.

use crate::models::{RatingBucket, Review};

/// Arithmetic mean of the ratings; 0.0 for a reviewless business.
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let total: i64 = reviews.iter().map(|review| i64::from(review.rating)).sum();
    total as f64 / reviews.len() as f64
}

/// Number of filled stars to render, clamped to 0..=5.
pub fn star_display_count(average: f64) -> u8 {
    average.round().clamp(0.0, 5.0) as u8
}

/// Per-star counts and percentages, from five stars down to one. Percentages
/// are all zero when there are no reviews.
pub fn rating_breakdown(reviews: &[Review]) -> Vec<RatingBucket> {
    let total = reviews.len();
    (1..=5)
        .rev()
        .map(|star| {
            let count = reviews.iter().filter(|review| review.rating == star).count();
            let percentage = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            RatingBucket {
                rating: star,
                count,
                percentage,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn review(rating: i32) -> Review {
        let now = Utc::now();
        Review {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating,
            comment: "fine".into(),
            reply: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_review_set_averages_to_zero() {
        assert_eq!(average_rating(&[]), 0.0);
    }

    #[test]
    fn average_is_the_arithmetic_mean() {
        let reviews = vec![review(5), review(4), review(4), review(2)];
        assert!((average_rating(&reviews) - 3.75).abs() < f64::EPSILON);
    }

    #[test]
    fn star_count_rounds_and_clamps() {
        assert_eq!(star_display_count(0.0), 0);
        assert_eq!(star_display_count(2.4), 2);
        assert_eq!(star_display_count(2.5), 3);
        assert_eq!(star_display_count(4.6), 5);
        assert_eq!(star_display_count(7.2), 5);
    }

    #[test]
    fn breakdown_runs_five_stars_down_to_one() {
        let buckets = rating_breakdown(&[review(3)]);
        let order: Vec<i32> = buckets.iter().map(|bucket| bucket.rating).collect();
        assert_eq!(order, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn breakdown_percentages_sum_to_one_hundred() {
        let reviews = vec![review(5), review(5), review(3), review(1)];
        let buckets = rating_breakdown(&reviews);

        let five_star = &buckets[0];
        assert_eq!(five_star.count, 2);
        assert!((five_star.percentage - 50.0).abs() < 1e-9);

        let total: f64 = buckets.iter().map(|bucket| bucket.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn breakdown_of_empty_set_is_all_zeros() {
        let buckets = rating_breakdown(&[]);
        assert_eq!(buckets.len(), 5);
        for bucket in buckets {
            assert_eq!(bucket.count, 0);
            assert_eq!(bucket.percentage, 0.0);
        }
    }
}
