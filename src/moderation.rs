//! Staff-side partitioning of listings by approval state. Approval itself is
//! one-directional: once a listing is approved there is no path back to
//! pending.

use crate::models::Business;

/// Dashboard status selector. Anything other than the two known values,
/// including absence, falls back to showing everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Pending,
    Approved,
}

impl StatusFilter {
    pub fn from_param(raw: &str) -> Self {
        match raw {
            "pending" => StatusFilter::Pending,
            "approved" => StatusFilter::Approved,
            _ => StatusFilter::All,
        }
    }
}

/// Partition the snapshot by approval state and order it newest first for
/// the dashboard. A pending listing is anything not explicitly approved.
pub fn filter_by_status(businesses: Vec<Business>, status: StatusFilter) -> Vec<Business> {
    let mut filtered: Vec<Business> = match status {
        StatusFilter::All => businesses,
        StatusFilter::Pending => businesses
            .into_iter()
            .filter(|business| !business.is_approved)
            .collect(),
        StatusFilter::Approved => businesses
            .into_iter()
            .filter(|business| business.is_approved)
            .collect(),
    };
    filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn business(name: &str, approved: bool, age_minutes: i64) -> Business {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Business {
            id: Uuid::new_v4(),
            name: name.into(),
            category: "Cafe".into(),
            address: "12 Main Street".into(),
            phone: "555-0101".into(),
            website: None,
            description: "A neighborhood fixture.".into(),
            services: String::new(),
            owner_id: Uuid::new_v4(),
            is_approved: approved,
            created_at: created,
            updated_at: created,
        }
    }

    fn names(businesses: &[Business]) -> Vec<&str> {
        businesses.iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn unknown_status_defaults_to_all() {
        assert_eq!(StatusFilter::from_param("pending"), StatusFilter::Pending);
        assert_eq!(StatusFilter::from_param("approved"), StatusFilter::Approved);
        assert_eq!(StatusFilter::from_param("all"), StatusFilter::All);
        assert_eq!(StatusFilter::from_param("bogus"), StatusFilter::All);
        assert_eq!(StatusFilter::from_param(""), StatusFilter::All);
    }

    #[test]
    fn pending_includes_everything_not_explicitly_approved() {
        // The third record mirrors a legacy import whose flag was never set;
        // the row mapping normalizes that to false before it gets here.
        let businesses = vec![
            business("Approved", true, 3),
            business("Pending", false, 2),
            business("Legacy", false, 1),
        ];
        let pending = filter_by_status(businesses, StatusFilter::Pending);
        assert_eq!(names(&pending), vec!["Legacy", "Pending"]);
    }

    #[test]
    fn approved_returns_only_approved() {
        let businesses = vec![
            business("Approved", true, 2),
            business("Pending", false, 1),
        ];
        let approved = filter_by_status(businesses, StatusFilter::Approved);
        assert_eq!(names(&approved), vec!["Approved"]);
    }

    #[test]
    fn dashboard_orders_newest_first() {
        let businesses = vec![
            business("Oldest", true, 30),
            business("Newest", false, 1),
            business("Middle", true, 10),
        ];
        let all = filter_by_status(businesses, StatusFilter::All);
        assert_eq!(names(&all), vec!["Newest", "Middle", "Oldest"]);
    }
}
