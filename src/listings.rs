//! The search pipeline: visibility and query filters over a full business
//! snapshot, rating annotation, stable ranking, and page slicing. Every
//! function takes its inputs by value or slice and runs in memory on the
//! point-in-time snapshot fetched at the start of the request.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{Business, BusinessListing, Page, Review};
use crate::ratings;

/// Page size for the search and category views.
pub const LISTING_PAGE_SIZE: usize = 9;
/// Number of businesses on the home-page featured slice.
pub const FEATURED_COUNT: usize = 4;

/// Index the review snapshot by business so annotation is a lookup.
pub fn group_reviews_by_business(reviews: Vec<Review>) -> HashMap<Uuid, Vec<Review>> {
    let mut grouped: HashMap<Uuid, Vec<Review>> = HashMap::new();
    for review in reviews {
        grouped.entry(review.business_id).or_default().push(review);
    }
    grouped
}

/// Public visibility: only approved listings are discoverable.
pub fn approved_only(businesses: Vec<Business>) -> Vec<Business> {
    businesses
        .into_iter()
        .filter(|business| business.is_approved)
        .collect()
}

fn matches_query(business: &Business, needle: &str) -> bool {
    [
        &business.name,
        &business.category,
        &business.description,
        &business.address,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Case-insensitive substring match against name, category, description and
/// address. An empty query is a no-op.
pub fn apply_text_filter(businesses: Vec<Business>, query: &str) -> Vec<Business> {
    if query.is_empty() {
        return businesses;
    }
    let needle = query.to_lowercase();
    businesses
        .into_iter()
        .filter(|business| matches_query(business, &needle))
        .collect()
}

/// Exact, case-sensitive category match. An empty category is a no-op.
pub fn apply_category_filter(businesses: Vec<Business>, category: &str) -> Vec<Business> {
    if category.is_empty() {
        return businesses;
    }
    businesses
        .into_iter()
        .filter(|business| business.category == category)
        .collect()
}

/// Attach rating aggregates to each business as a read-side projection.
pub fn annotate_with_ratings(
    businesses: Vec<Business>,
    reviews_by_business: &HashMap<Uuid, Vec<Review>>,
) -> Vec<BusinessListing> {
    businesses
        .into_iter()
        .map(|business| {
            let reviews = reviews_by_business
                .get(&business.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let average = ratings::average_rating(reviews);
            BusinessListing {
                average_rating: average,
                star_display_count: ratings::star_display_count(average),
                review_count: reviews.len(),
                business,
            }
        })
        .collect()
}

/// Keep listings at or above the minimum average rating. Input that does not
/// parse as a number skips the filter instead of failing the request.
pub fn apply_rating_threshold(
    listings: Vec<BusinessListing>,
    raw_threshold: &str,
) -> Vec<BusinessListing> {
    match raw_threshold.trim().parse::<f64>() {
        Ok(min_rating) => listings
            .into_iter()
            .filter(|listing| listing.average_rating >= min_rating)
            .collect(),
        Err(_) => listings,
    }
}

/// Stable sort by average rating, highest first. Ties keep their relative
/// input order; there is no secondary key.
pub fn rank_by_rating(listings: &mut [BusinessListing]) {
    listings.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
}

/// The home-page slice: rank, then truncate to the top entries.
pub fn featured(mut listings: Vec<BusinessListing>, count: usize) -> Vec<BusinessListing> {
    rank_by_rating(&mut listings);
    listings.truncate(count);
    listings
}

/// Distinct categories across the whole snapshot (approval state ignored),
/// in first-seen order.
pub fn distinct_categories(businesses: &[Business]) -> Vec<String> {
    let mut seen = HashSet::new();
    businesses
        .iter()
        .filter(|business| seen.insert(business.category.clone()))
        .map(|business| business.category.clone())
        .collect()
}

/// Page numbers arrive as raw query text; anything non-numeric means the
/// first page.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
}

/// Slice a ranked collection into one fixed-size page. The 1-based page
/// index clamps to the nearest valid page; an empty collection still yields
/// a single empty page.
pub fn paginate<T>(items: Vec<T>, page_size: usize, requested_page: i64) -> Page<T> {
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = requested_page.clamp(1, total_pages as i64) as usize;
    let start = (page - 1) * page_size;
    let items: Vec<T> = items.into_iter().skip(start).take(page_size).collect();
    Page {
        items,
        page,
        page_size,
        total_items,
        total_pages,
        has_previous: page > 1,
        has_next: page < total_pages,
    }
}

/// The full public search pipeline: visibility, text and category filters,
/// rating annotation, threshold, rank. Filters commute; text and category
/// run first only so averages are not computed for rows already excluded.
pub fn search_listings(
    businesses: Vec<Business>,
    reviews_by_business: &HashMap<Uuid, Vec<Review>>,
    query: &str,
    category: &str,
    raw_threshold: &str,
) -> Vec<BusinessListing> {
    let visible = approved_only(businesses);
    let visible = apply_text_filter(visible, query);
    let visible = apply_category_filter(visible, category);
    let annotated = annotate_with_ratings(visible, reviews_by_business);
    let mut listings = apply_rating_threshold(annotated, raw_threshold);
    rank_by_rating(&mut listings);
    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn business(name: &str, category: &str, approved: bool) -> Business {
        let now = Utc::now();
        Business {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            address: "12 Main Street".into(),
            phone: "555-0101".into(),
            website: None,
            description: format!("{name} serves the neighborhood."),
            services: String::new(),
            owner_id: Uuid::new_v4(),
            is_approved: approved,
            created_at: now,
            updated_at: now,
        }
    }

    fn reviews_for(business: &Business, stars: &[i32]) -> Vec<Review> {
        let now = Utc::now();
        stars
            .iter()
            .map(|&rating| Review {
                id: Uuid::new_v4(),
                business_id: business.id,
                user_id: Uuid::new_v4(),
                rating,
                comment: "fine".into(),
                reply: None,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    fn names(listings: &[BusinessListing]) -> Vec<&str> {
        listings
            .iter()
            .map(|listing| listing.business.name.as_str())
            .collect()
    }

    #[test]
    fn unapproved_businesses_are_never_discoverable() {
        let businesses = vec![
            business("Visible", "Cafe", true),
            business("Hidden", "Cafe", false),
        ];
        let results = search_listings(businesses, &HashMap::new(), "", "", "");
        assert_eq!(names(&results), vec!["Visible"]);
    }

    #[test]
    fn text_filter_matches_any_field_case_insensitively() {
        let mut by_address = business("Plain Name", "Cafe", true);
        by_address.address = "7 Harbour Road".into();
        let businesses = vec![
            business("Harbour Grill", "Restaurant", true),
            by_address,
            business("Elsewhere", "Cafe", true),
        ];
        let filtered = apply_text_filter(businesses, "HARBOUR");
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn empty_query_is_a_no_op() {
        let businesses = vec![
            business("One", "Cafe", true),
            business("Two", "Bakery", true),
        ];
        assert_eq!(apply_text_filter(businesses, "").len(), 2);
    }

    #[test]
    fn category_filter_is_exact_and_case_sensitive() {
        let businesses = vec![
            business("One", "Plumbing", true),
            business("Two", "plumbing", true),
            business("Three", "Plumbing Supplies", true),
        ];
        let filtered = apply_category_filter(businesses, "Plumbing");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "One");
    }

    #[test]
    fn unparseable_rating_threshold_is_ignored() {
        let a = business("A", "Cafe", true);
        let reviews = group_reviews_by_business(reviews_for(&a, &[2]));
        let listings = annotate_with_ratings(vec![a], &reviews);

        let kept = apply_rating_threshold(listings, "not-a-number");
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn rating_threshold_keeps_averages_at_or_above() {
        let a = business("A", "Cafe", true);
        let b = business("B", "Cafe", true);
        let mut reviews = reviews_for(&a, &[4, 4]);
        reviews.extend(reviews_for(&b, &[3]));
        let grouped = group_reviews_by_business(reviews);
        let listings = annotate_with_ratings(vec![a, b], &grouped);

        let kept = apply_rating_threshold(listings, "3.5");
        assert_eq!(names(&kept), vec!["A"]);
    }

    #[test]
    fn search_combines_category_and_threshold() {
        let plumber_good = business("Good Plumber", "Plumbing", true);
        let plumber_ok = business("Ok Plumber", "Plumbing", true);
        let electrician = business("Electrician", "Electrical", true);
        let mut reviews = reviews_for(&plumber_good, &[4]);
        reviews.extend(reviews_for(&plumber_ok, &[3]));
        reviews.extend(reviews_for(&electrician, &[5]));
        let grouped = group_reviews_by_business(reviews);

        let results = search_listings(
            vec![plumber_good, plumber_ok, electrician],
            &grouped,
            "",
            "Plumbing",
            "3.5",
        );
        assert_eq!(names(&results), vec!["Good Plumber"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let businesses = vec![
            business("Harbour Grill", "Restaurant", true),
            business("Corner Cafe", "Cafe", true),
            business("Hidden", "Cafe", false),
        ];
        let once = search_listings(businesses, &HashMap::new(), "cafe", "", "");
        let again = search_listings(
            once.iter().map(|l| l.business.clone()).collect(),
            &HashMap::new(),
            "cafe",
            "",
            "",
        );
        assert_eq!(names(&once), names(&again));
    }

    #[test]
    fn ranking_is_descending_and_stable_on_ties() {
        let a = business("A", "Cafe", true);
        let b = business("B", "Cafe", true);
        let c = business("C", "Cafe", true);
        let mut reviews = reviews_for(&a, &[4, 5]);
        reviews.extend(reviews_for(&b, &[5, 4]));
        reviews.extend(reviews_for(&c, &[2]));
        let grouped = group_reviews_by_business(reviews);

        let mut listings = annotate_with_ratings(vec![a, b, c], &grouped);
        rank_by_rating(&mut listings);

        assert_eq!(names(&listings), vec!["A", "B", "C"]);
        for pair in listings.windows(2) {
            assert!(pair[0].average_rating >= pair[1].average_rating);
        }
    }

    #[test]
    fn featured_truncates_to_the_top_entries() {
        let a = business("A", "Cafe", true);
        let b = business("B", "Cafe", true);
        let c = business("C", "Cafe", true);
        let mut reviews = reviews_for(&a, &[3]);
        reviews.extend(reviews_for(&b, &[5]));
        reviews.extend(reviews_for(&c, &[4]));
        let grouped = group_reviews_by_business(reviews);
        let listings = annotate_with_ratings(vec![a, b, c], &grouped);

        let top = featured(listings, 2);
        assert_eq!(names(&top), vec!["B", "C"]);
    }

    #[test]
    fn distinct_categories_dedup_in_first_seen_order() {
        let businesses = vec![
            business("One", "Cafe", true),
            business("Two", "Bakery", false),
            business("Three", "Cafe", true),
        ];
        assert_eq!(distinct_categories(&businesses), vec!["Cafe", "Bakery"]);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let page = paginate((0..20).collect::<Vec<i32>>(), 9, 3);
        assert_eq!(page.items, vec![18, 19]);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn exact_multiple_fills_the_last_page() {
        let page = paginate((0..18).collect::<Vec<i32>>(), 9, 2);
        assert_eq!(page.items.len(), 9);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn out_of_range_pages_clamp_to_first_and_last() {
        let items: Vec<i32> = (0..20).collect();

        let below = paginate(items.clone(), 9, 0);
        assert_eq!(below.page, 1);
        assert_eq!(below.items[0], 0);

        let above = paginate(items, 9, 99);
        assert_eq!(above.page, 3);
        assert_eq!(above.items, vec![18, 19]);
    }

    #[test]
    fn empty_collection_yields_a_single_empty_page() {
        let page = paginate(Vec::<i32>::new(), 9, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_previous);
        assert!(!page.has_next);
    }

    #[test]
    fn non_numeric_page_means_first_page() {
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
    }
}
