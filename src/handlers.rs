use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use futures_util::try_join;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::database::Database;
use crate::listings::{self, FEATURED_COUNT, LISTING_PAGE_SIZE};
use crate::models::{
    ApiResponse, Business, BusinessDetail, BusinessListingRequest, CategoryListing,
    CreateReviewRequest, DashboardData, HomePage, NewUserProfile, ProfileData, RegisterUserRequest,
    RegisteredUser, Review, ReviewReplyRequest, SearchResults, UpdateProfileRequest, UserAccount,
};
use crate::moderation::{self, StatusFilter};
use crate::ratings;

fn extract_actor_id(req: &HttpRequest) -> Result<Uuid, String> {
    req.headers()
        .get("X-Actor-Id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| "Missing or invalid X-Actor-Id header".to_string())
}

/// Resolve the acting user's account record, or the response that ends the
/// request: 400 for a bad header, 404 for an unknown account.
async fn load_actor(db: &Database, req: &HttpRequest) -> Result<UserAccount, HttpResponse> {
    let actor_id = match extract_actor_id(req) {
        Ok(id) => id,
        Err(err) => return Err(HttpResponse::BadRequest().json(ApiResponse::<()>::error(err))),
    };

    match db.get_user(actor_id).await {
        Ok(Some(account)) => Ok(account),
        Ok(None) => {
            Err(HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found".into())))
        }
        Err(err) => {
            log::error!("Failed to load acting user: {err:?}");
            Err(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load acting user".into())))
        }
    }
}

/// Refused gated actions mirror the site's notice-and-back-to-home flow: the
/// envelope carries the notice, the status stays 200 rather than a hard
/// HTTP error.
fn access_denied() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::<()>::error("Access denied.".into()))
}

/// Point-in-time snapshot for a pipeline run. Businesses and reviews are
/// fetched together at the start of the request; no isolation is promised
/// against writes that land mid-request.
async fn fetch_catalog_snapshot(
    db: &Database,
) -> Result<(Vec<Business>, Vec<Review>), HttpResponse> {
    match try_join!(db.list_businesses(), db.list_reviews()) {
        Ok(snapshot) => Ok(snapshot),
        Err(err) => {
            log::error!("Failed to load catalog snapshot: {err:?}");
            Err(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load businesses".into())))
        }
    }
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "business-directory",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// PUBLIC DIRECTORY
// ============================================================================

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub rating: Option<String>,
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

#[get("/home")]
pub async fn home(db: web::Data<Database>) -> impl Responder {
    let (businesses, reviews) = match fetch_catalog_snapshot(&db).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let categories = listings::distinct_categories(&businesses);
    let reviews_by_business = listings::group_reviews_by_business(reviews);
    let approved = listings::approved_only(businesses);
    let annotated = listings::annotate_with_ratings(approved, &reviews_by_business);
    let featured = listings::featured(annotated, FEATURED_COUNT);

    HttpResponse::Ok().json(ApiResponse::success(HomePage {
        featured,
        categories,
    }))
}

#[get("/search")]
pub async fn search(db: web::Data<Database>, params: web::Query<SearchParams>) -> impl Responder {
    let params = params.into_inner();
    let query = params.q.unwrap_or_default();
    let category = params.category.unwrap_or_default();
    let rating = params.rating.unwrap_or_default();

    let (businesses, reviews) = match fetch_catalog_snapshot(&db).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let categories = listings::distinct_categories(&businesses);
    let reviews_by_business = listings::group_reviews_by_business(reviews);
    let results =
        listings::search_listings(businesses, &reviews_by_business, &query, &category, &rating);
    let page = listings::paginate(
        results,
        LISTING_PAGE_SIZE,
        listings::parse_page(params.page.as_deref()),
    );

    HttpResponse::Ok().json(ApiResponse::success(SearchResults {
        businesses: page,
        query,
        categories,
        selected_category: category,
        selected_rating: rating,
    }))
}

#[get("/categories/{category}")]
pub async fn category_listing(
    db: web::Data<Database>,
    category: web::Path<String>,
    params: web::Query<PageParams>,
) -> impl Responder {
    let category = category.into_inner();

    let (businesses, reviews) = match fetch_catalog_snapshot(&db).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let reviews_by_business = listings::group_reviews_by_business(reviews);
    let visible =
        listings::apply_category_filter(listings::approved_only(businesses), &category);
    let mut annotated = listings::annotate_with_ratings(visible, &reviews_by_business);
    listings::rank_by_rating(&mut annotated);

    // Review total across the whole category, not just the requested page.
    let total_reviews: usize = annotated.iter().map(|listing| listing.review_count).sum();

    let page = listings::paginate(
        annotated,
        LISTING_PAGE_SIZE,
        listings::parse_page(params.page.as_deref()),
    );

    HttpResponse::Ok().json(ApiResponse::success(CategoryListing {
        businesses: page,
        category,
        total_reviews,
    }))
}

/// Detail is reachable for any listing by id, approved or not; direct links
/// are not gated by moderation.
#[get("/businesses/{business_id}")]
pub async fn business_detail(
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();

    let business = match db.get_business(business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()));
        }
    };

    let reviews = match db.list_reviews_for_business(business_id).await {
        Ok(reviews) => reviews,
        Err(err) => {
            log::error!("Failed to list reviews: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list reviews".into()));
        }
    };

    let average = ratings::average_rating(&reviews);
    let detail = BusinessDetail {
        average_rating: average,
        star_display_count: ratings::star_display_count(average),
        rating_breakdown: ratings::rating_breakdown(&reviews),
        total_reviews: reviews.len(),
        business,
        reviews,
    };

    HttpResponse::Ok().json(ApiResponse::success(detail))
}

// ============================================================================
// REVIEWS
// ============================================================================

#[post("/businesses/{business_id}/reviews")]
pub async fn submit_review(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    payload: web::Json<CreateReviewRequest>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let business_id = business_id.into_inner();
    match db.get_business(business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()));
        }
    }

    // One review per user per business. Check-then-create: a concurrent
    // duplicate submission can slip past this probe.
    match db
        .find_review_by_business_and_user(business_id, actor.id)
        .await
    {
        Ok(Some(_)) => {
            return HttpResponse::Ok().json(ApiResponse::<()>::error(
                "You have already reviewed this business.".into(),
            ))
        }
        Ok(None) => {}
        Err(err) => {
            log::error!("Failed to check for existing review: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to submit review".into()));
        }
    }

    let new_review = body.into_new_review(business_id, actor.id);
    match db.create_review(new_review).await {
        Ok(review) => HttpResponse::Created().json(ApiResponse::success(review)),
        Err(err) => {
            log::error!("Failed to create review: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to submit review".into()))
        }
    }
}

#[post("/reviews/{review_id}/reply")]
pub async fn submit_review_reply(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
    payload: web::Json<ReviewReplyRequest>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let review_id = review_id.into_inner();
    let review = match db.get_review(review_id).await {
        Ok(Some(review)) => review,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Review not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get review: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get review".into()));
        }
    };

    let business = match db.get_business(review.business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()));
        }
    };

    if business.owner_id != actor.id {
        return HttpResponse::Forbidden().json(ApiResponse::<()>::error(
            "Only the business owner can reply to reviews".into(),
        ));
    }

    match db.set_review_reply(review_id, &body.reply).await {
        Ok(Some(updated)) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Review not found".into()))
        }
        Err(err) => {
            log::error!("Failed to save reply: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to save reply".into()))
        }
    }
}

// ============================================================================
// OWNER LISTINGS
// ============================================================================

#[post("/businesses")]
pub async fn create_business(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<BusinessListingRequest>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let new_business = body.into_new_business(actor.id);
    match db.create_business(new_business).await {
        Ok(business) => HttpResponse::Created().json(ApiResponse::success(business)),
        Err(err) => {
            log::error!("Failed to create business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create business".into()))
        }
    }
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
    payload: web::Json<BusinessListingRequest>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let business_id = business_id.into_inner();
    let mut existing = match db.get_business(business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()));
        }
    };

    if existing.owner_id != actor.id {
        return access_denied();
    }

    body.apply_to_existing(&mut existing);
    match db.update_business(existing).await {
        Ok(updated) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Err(err) => {
            log::error!("Failed to update business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update business".into()))
        }
    }
}

#[delete("/businesses/{business_id}")]
pub async fn delete_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let business_id = business_id.into_inner();
    let existing = match db.get_business(business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()));
        }
    };

    if existing.owner_id != actor.id && !actor.is_staff {
        return access_denied();
    }

    match db.delete_business(business_id).await {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(err) => {
            log::error!("Failed to delete business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to delete business".into()))
        }
    }
}

// ============================================================================
// ACCOUNTS & PROFILES
// ============================================================================

#[post("/users")]
pub async fn register_user(
    db: web::Data<Database>,
    payload: web::Json<RegisterUserRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let account = match db.create_user(body.into_new_account()).await {
        Ok(account) => account,
        Err(err) => {
            log::error!("Failed to create user: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create user".into()));
        }
    };

    match db.create_profile(NewUserProfile::for_user(account.id)).await {
        Ok(profile) => {
            HttpResponse::Created().json(ApiResponse::success(RegisteredUser { account, profile }))
        }
        Err(err) => {
            log::error!("Failed to create profile: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create profile".into()))
        }
    }
}

#[get("/profile")]
pub async fn get_profile(req: HttpRequest, db: web::Data<Database>) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match try_join!(
        db.get_or_create_profile(actor.id),
        db.list_businesses_for_owner(actor.id),
        db.list_reviews_for_user(actor.id)
    ) {
        Ok((profile, businesses, reviews)) => {
            HttpResponse::Ok().json(ApiResponse::success(ProfileData {
                profile,
                businesses,
                reviews,
            }))
        }
        Err(err) => {
            log::error!("Failed to load profile: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load profile".into()))
        }
    }
}

#[put("/profile")]
pub async fn update_profile(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    if let Err(err) = db.get_or_create_profile(actor.id).await {
        log::error!("Failed to load profile: {err:?}");
        return HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error("Failed to load profile".into()));
    }

    match db
        .update_profile(actor.id, &body.phone, &body.address, &body.bio)
        .await
    {
        Ok(Some(profile)) => HttpResponse::Ok().json(ApiResponse::success(profile)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Profile not found".into()))
        }
        Err(err) => {
            log::error!("Failed to update profile: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update profile".into()))
        }
    }
}

// ============================================================================
// STAFF MODERATION
// ============================================================================

#[derive(Deserialize)]
pub struct DashboardParams {
    pub status: Option<String>,
}

#[get("/dashboard")]
pub async fn dashboard(
    req: HttpRequest,
    db: web::Data<Database>,
    params: web::Query<DashboardParams>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if !actor.is_staff {
        return access_denied();
    }

    let status = StatusFilter::from_param(params.status.as_deref().unwrap_or("all"));

    match try_join!(db.list_businesses(), db.list_users(), db.list_reviews()) {
        Ok((businesses, users, reviews)) => {
            let businesses = moderation::filter_by_status(businesses, status);
            HttpResponse::Ok().json(ApiResponse::success(DashboardData {
                businesses,
                users,
                reviews,
            }))
        }
        Err(err) => {
            log::error!("Failed to load dashboard: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load dashboard".into()))
        }
    }
}

#[post("/dashboard/businesses/{business_id}/approve")]
pub async fn approve_business(
    req: HttpRequest,
    db: web::Data<Database>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if !actor.is_staff {
        return access_denied();
    }

    match db.approve_business(business_id.into_inner()).await {
        Ok(Some(business)) => {
            log::info!("Business \"{}\" has been approved", business.name);
            HttpResponse::Ok().json(ApiResponse::success(business))
        }
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to approve business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to approve business".into()))
        }
    }
}

#[post("/dashboard/users/{user_id}/toggle-staff")]
pub async fn toggle_staff(
    req: HttpRequest,
    db: web::Data<Database>,
    user_id: web::Path<Uuid>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if !actor.is_staff {
        return access_denied();
    }

    match db.toggle_staff(user_id.into_inner()).await {
        Ok(Some(account)) => HttpResponse::Ok().json(ApiResponse::success(account)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("User not found".into()))
        }
        Err(err) => {
            log::error!("Failed to toggle staff flag: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to toggle staff flag".into()))
        }
    }
}

#[delete("/dashboard/reviews/{review_id}")]
pub async fn delete_review(
    req: HttpRequest,
    db: web::Data<Database>,
    review_id: web::Path<Uuid>,
) -> impl Responder {
    let actor = match load_actor(&db, &req).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    if !actor.is_staff {
        return access_denied();
    }

    match db.delete_review(review_id.into_inner()).await {
        Ok(_) => HttpResponse::NoContent().finish(),
        Err(err) => {
            log::error!("Failed to delete review: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to delete review".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn health_check_reports_ok() {
        let app = test::init_service(App::new().service(health_check)).await;
        let response =
            test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert!(response.status().is_success());
    }
}
