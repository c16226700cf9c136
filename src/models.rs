use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// ENTITIES
// ============================================================================

/// A listed business, owned by a user and gated by staff approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub address: String,
    pub phone: String,
    pub website: Option<String>,
    pub description: String,
    pub services: String,
    pub owner_id: Uuid,
    /// False until a staff member approves the listing. Legacy rows without
    /// the flag are normalized to false at the row-mapping boundary.
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub address: String,
    pub phone: String,
    pub website: Option<String>,
    pub description: String,
    pub services: String,
    pub owner_id: Uuid,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single user's rating and comment for one business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User account record. Only the fields this service reads; authentication
/// lives elsewhere and the acting user arrives via the X-Actor-Id header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// Helper struct used when inserting a new user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// One-to-one profile for a user account, created lazily on first access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
    pub address: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: String,
    pub address: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUserProfile {
    /// Empty profile shell, used by the get-or-create path.
    pub fn for_user(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            phone: String::new(),
            address: String::new(),
            bio: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Payload for account registration
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(length(min = 3, max = 60))]
    pub username: String,
    #[validate(email)]
    pub email: String,
}

impl RegisterUserRequest {
    pub fn into_new_account(self) -> NewUserAccount {
        NewUserAccount {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            is_staff: false,
            date_joined: Utc::now(),
        }
    }
}

/// Payload sent by owners to create or edit a listing
#[derive(Debug, Deserialize, Validate)]
pub struct BusinessListingRequest {
    #[validate(length(min = 3, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 100))]
    pub category: String,
    #[validate(length(min = 5))]
    pub address: String,
    #[validate(length(min = 3, max = 20))]
    pub phone: String,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(min = 10, max = 2000))]
    pub description: String,
    #[validate(length(max = 2000))]
    pub services: String,
}

impl BusinessListingRequest {
    /// New listings always start pending; approval is a staff action.
    pub fn into_new_business(self, owner_id: Uuid) -> NewBusiness {
        let now = Utc::now();
        NewBusiness {
            id: Uuid::new_v4(),
            name: self.name,
            category: self.category,
            address: self.address,
            phone: self.phone,
            website: self.website,
            description: self.description,
            services: self.services,
            owner_id,
            is_approved: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Owner edits never touch the approval flag.
    pub fn apply_to_existing(&self, existing: &mut Business) {
        existing.name = self.name.clone();
        existing.category = self.category.clone();
        existing.address = self.address.clone();
        existing.phone = self.phone.clone();
        existing.website = self.website.clone();
        existing.description = self.description.clone();
        existing.services = self.services.clone();
        existing.updated_at = Utc::now();
    }
}

/// Payload for submitting a review
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 4000))]
    pub comment: String,
}

impl CreateReviewRequest {
    pub fn into_new_review(self, business_id: Uuid, user_id: Uuid) -> NewReview {
        let now = Utc::now();
        NewReview {
            id: Uuid::new_v4(),
            business_id,
            user_id,
            rating: self.rating,
            comment: self.comment,
            reply: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for an owner replying to a review
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewReplyRequest {
    #[validate(length(min = 1, max = 4000))]
    pub reply: String,
}

/// Payload for profile updates
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 20))]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: String,
    #[validate(length(max = 2000))]
    pub bio: String,
}

// ============================================================================
// READ-SIDE PROJECTIONS
// ============================================================================

/// A business enriched with rating aggregates, computed per request and
/// never written back to the store.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessListing {
    #[serde(flatten)]
    pub business: Business,
    pub average_rating: f64,
    pub star_display_count: u8,
    pub review_count: usize,
}

/// Per-star slice of a business's review set, in descending star order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: usize,
    pub percentage: f64,
}

/// One fixed-size slice of a ranked collection.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

// ============================================================================
// COMPOSITE RESPONSE TYPES
// ============================================================================

/// Home page payload: featured slice plus the category index
#[derive(Debug, Serialize)]
pub struct HomePage {
    pub featured: Vec<BusinessListing>,
    pub categories: Vec<String>,
}

/// Search results with the echoed filter selection
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub businesses: Page<BusinessListing>,
    pub query: String,
    pub categories: Vec<String>,
    pub selected_category: String,
    pub selected_rating: String,
}

/// Single-category listing with the aggregate review total for the category
#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub businesses: Page<BusinessListing>,
    pub category: String,
    pub total_reviews: usize,
}

/// Business detail with rating aggregates and its reviews, newest first
#[derive(Debug, Serialize)]
pub struct BusinessDetail {
    pub business: Business,
    pub average_rating: f64,
    pub star_display_count: u8,
    pub rating_breakdown: Vec<RatingBucket>,
    pub total_reviews: usize,
    pub reviews: Vec<Review>,
}

/// Staff dashboard payload
#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub businesses: Vec<Business>,
    pub users: Vec<UserAccount>,
    pub reviews: Vec<Review>,
}

/// Profile page payload: the profile plus the user's own listings and reviews
#[derive(Debug, Serialize)]
pub struct ProfileData {
    pub profile: UserProfile,
    pub businesses: Vec<Business>,
    pub reviews: Vec<Review>,
}

/// Registration result: the account and its eagerly created profile
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub account: UserAccount,
    pub profile: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_rating_must_be_within_one_to_five() {
        let too_low = CreateReviewRequest {
            rating: 0,
            comment: "not great".into(),
        };
        let too_high = CreateReviewRequest {
            rating: 6,
            comment: "amazing".into(),
        };
        assert!(too_low.validate().is_err());
        assert!(too_high.validate().is_err());

        for rating in 1..=5 {
            let ok = CreateReviewRequest {
                rating,
                comment: "fine".into(),
            };
            assert!(ok.validate().is_ok());
        }
    }

    #[test]
    fn review_comment_must_not_be_empty() {
        let request = CreateReviewRequest {
            rating: 4,
            comment: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn new_listings_start_pending() {
        let request = BusinessListingRequest {
            name: "Corner Bakery".into(),
            category: "Bakery".into(),
            address: "12 Main Street".into(),
            phone: "555-0101".into(),
            website: None,
            description: "Fresh bread every morning.".into(),
            services: "Bread, pastries".into(),
        };
        let owner = Uuid::new_v4();
        let new_business = request.into_new_business(owner);
        assert!(!new_business.is_approved);
        assert_eq!(new_business.owner_id, owner);
    }

    #[test]
    fn owner_edits_leave_approval_untouched() {
        let request = BusinessListingRequest {
            name: "Corner Bakery".into(),
            category: "Bakery".into(),
            address: "12 Main Street".into(),
            phone: "555-0101".into(),
            website: Some("https://corner.example".into()),
            description: "Fresh bread every morning.".into(),
            services: "Bread, pastries".into(),
        };
        let now = Utc::now();
        let mut business = Business {
            id: Uuid::new_v4(),
            name: "Old Name".into(),
            category: "Cafe".into(),
            address: "1 Old Road".into(),
            phone: "555-9999".into(),
            website: None,
            description: "Old description text.".into(),
            services: String::new(),
            owner_id: Uuid::new_v4(),
            is_approved: true,
            created_at: now,
            updated_at: now,
        };

        request.apply_to_existing(&mut business);

        assert_eq!(business.name, "Corner Bakery");
        assert_eq!(business.category, "Bakery");
        assert!(business.is_approved);
    }
}
