use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::models::{
    Business, NewBusiness, NewReview, NewUserAccount, NewUserProfile, Review, UserAccount,
    UserProfile,
};

/// Store-level failures. These are the only unrecoverable errors in the
/// service; everything above the store degrades gracefully.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid database configuration: {0}")]
    Config(#[from] deadpool_postgres::CreatePoolError),
    #[error("failed to acquire database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let mut cfg = Config::new();
        cfg.url = Some(database_url.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        let client = pool.get().await?;
        client.execute("SELECT 1", &[]).await?;

        log::info!("Database connection established");
        Ok(Self { pool })
    }

    async fn client(&self) -> StoreResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    /// Full snapshot of every listing, oldest first. The search pipeline
    /// filters and ranks this in memory.
    pub async fn list_businesses(&self) -> StoreResult<Vec<Business>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at FROM businesses ORDER BY created_at ASC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_business).collect())
    }

    pub async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at FROM businesses WHERE id = $1",
                &[&business_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_business))
    }

    pub async fn list_businesses_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Business>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at FROM businesses WHERE owner_id = $1 ORDER BY created_at DESC",
                &[&owner_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_business).collect())
    }

    pub async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO businesses (id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at",
                &[
                    &business.id,
                    &business.name,
                    &business.category,
                    &business.address,
                    &business.phone,
                    &business.website,
                    &business.description,
                    &business.services,
                    &business.owner_id,
                    &business.is_approved,
                    &business.created_at,
                    &business.updated_at,
                ],
            )
            .await?;
        Ok(row_to_business(&row))
    }

    pub async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "UPDATE businesses SET name = $2, category = $3, address = $4, phone = $5, website = $6, description = $7, services = $8, updated_at = NOW() WHERE id = $1 RETURNING id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at",
                &[
                    &business.id,
                    &business.name,
                    &business.category,
                    &business.address,
                    &business.phone,
                    &business.website,
                    &business.description,
                    &business.services,
                ],
            )
            .await?;
        Ok(row_to_business(&row))
    }

    /// One-directional transition: sets the flag true and leaves it there.
    /// Approving an already-approved listing is a no-op.
    pub async fn approve_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "UPDATE businesses SET is_approved = TRUE, updated_at = NOW() WHERE id = $1 RETURNING id, name, category, address, phone, website, description, services, owner_id, is_approved, created_at, updated_at",
                &[&business_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_business))
    }

    pub async fn delete_business(&self, business_id: Uuid) -> StoreResult<u64> {
        let client = self.client().await?;
        Ok(client
            .execute("DELETE FROM businesses WHERE id = $1", &[&business_id])
            .await?)
    }

    // ========================================================================
    // REVIEWS
    // ========================================================================

    /// Full review snapshot, newest first. Serves both the dashboard list
    /// and the grouped lookup the pipeline builds.
    pub async fn list_reviews(&self) -> StoreResult<Vec<Review>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, user_id, rating, comment, reply, created_at, updated_at FROM reviews ORDER BY created_at DESC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_review).collect())
    }

    pub async fn list_reviews_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Review>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, user_id, rating, comment, reply, created_at, updated_at FROM reviews WHERE business_id = $1 ORDER BY created_at DESC",
                &[&business_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_review).collect())
    }

    pub async fn list_reviews_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Review>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, business_id, user_id, rating, comment, reply, created_at, updated_at FROM reviews WHERE user_id = $1 ORDER BY created_at DESC",
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(row_to_review).collect())
    }

    pub async fn get_review(&self, review_id: Uuid) -> StoreResult<Option<Review>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, business_id, user_id, rating, comment, reply, created_at, updated_at FROM reviews WHERE id = $1",
                &[&review_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_review))
    }

    /// Existence probe for the one-review-per-user rule. Check-then-create;
    /// not atomic against concurrent submissions.
    pub async fn find_review_by_business_and_user(
        &self,
        business_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Review>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, business_id, user_id, rating, comment, reply, created_at, updated_at FROM reviews WHERE business_id = $1 AND user_id = $2",
                &[&business_id, &user_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_review))
    }

    pub async fn create_review(&self, review: NewReview) -> StoreResult<Review> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO reviews (id, business_id, user_id, rating, comment, reply, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id, business_id, user_id, rating, comment, reply, created_at, updated_at",
                &[
                    &review.id,
                    &review.business_id,
                    &review.user_id,
                    &review.rating,
                    &review.comment,
                    &review.reply,
                    &review.created_at,
                    &review.updated_at,
                ],
            )
            .await?;
        Ok(row_to_review(&row))
    }

    pub async fn set_review_reply(
        &self,
        review_id: Uuid,
        reply: &str,
    ) -> StoreResult<Option<Review>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "UPDATE reviews SET reply = $2, updated_at = NOW() WHERE id = $1 RETURNING id, business_id, user_id, rating, comment, reply, created_at, updated_at",
                &[&review_id, &reply],
            )
            .await?;
        Ok(row.as_ref().map(row_to_review))
    }

    pub async fn delete_review(&self, review_id: Uuid) -> StoreResult<u64> {
        let client = self.client().await?;
        Ok(client
            .execute("DELETE FROM reviews WHERE id = $1", &[&review_id])
            .await?)
    }

    // ========================================================================
    // USER ACCOUNTS
    // ========================================================================

    pub async fn list_users(&self) -> StoreResult<Vec<UserAccount>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id, username, email, is_staff, date_joined FROM user_accounts ORDER BY date_joined DESC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_user_account).collect())
    }

    pub async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<UserAccount>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, username, email, is_staff, date_joined FROM user_accounts WHERE id = $1",
                &[&user_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_account))
    }

    pub async fn create_user(&self, account: NewUserAccount) -> StoreResult<UserAccount> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO user_accounts (id, username, email, is_staff, date_joined) VALUES ($1, $2, $3, $4, $5) RETURNING id, username, email, is_staff, date_joined",
                &[
                    &account.id,
                    &account.username,
                    &account.email,
                    &account.is_staff,
                    &account.date_joined,
                ],
            )
            .await?;
        Ok(row_to_user_account(&row))
    }

    /// Flips the staff flag in a single statement; two calls restore the
    /// original state.
    pub async fn toggle_staff(&self, user_id: Uuid) -> StoreResult<Option<UserAccount>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "UPDATE user_accounts SET is_staff = NOT is_staff WHERE id = $1 RETURNING id, username, email, is_staff, date_joined",
                &[&user_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_account))
    }

    // ========================================================================
    // USER PROFILES
    // ========================================================================

    pub async fn get_profile_for_user(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, user_id, phone, address, bio, created_at, updated_at FROM user_profiles WHERE user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_profile))
    }

    pub async fn create_profile(&self, profile: NewUserProfile) -> StoreResult<UserProfile> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO user_profiles (id, user_id, phone, address, bio, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id, user_id, phone, address, bio, created_at, updated_at",
                &[
                    &profile.id,
                    &profile.user_id,
                    &profile.phone,
                    &profile.address,
                    &profile.bio,
                    &profile.created_at,
                    &profile.updated_at,
                ],
            )
            .await?;
        Ok(row_to_user_profile(&row))
    }

    /// Profiles are created lazily on first access.
    pub async fn get_or_create_profile(&self, user_id: Uuid) -> StoreResult<UserProfile> {
        if let Some(profile) = self.get_profile_for_user(user_id).await? {
            return Ok(profile);
        }
        self.create_profile(NewUserProfile::for_user(user_id)).await
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        phone: &str,
        address: &str,
        bio: &str,
    ) -> StoreResult<Option<UserProfile>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "UPDATE user_profiles SET phone = $2, address = $3, bio = $4, updated_at = NOW() WHERE user_id = $1 RETURNING id, user_id, phone, address, bio, created_at, updated_at",
                &[&user_id, &phone, &address, &bio],
            )
            .await?;
        Ok(row.as_ref().map(row_to_user_profile))
    }
}

// Row mapping functions
fn row_to_business(row: &tokio_postgres::Row) -> Business {
    Business {
        id: row.get("id"),
        name: row.get("name"),
        category: row.get("category"),
        address: row.get("address"),
        phone: row.get("phone"),
        website: row.get("website"),
        description: row.get("description"),
        services: row.get("services"),
        owner_id: row.get("owner_id"),
        // NULL means the flag was never set (legacy import); treat as pending.
        is_approved: row.get::<_, Option<bool>>("is_approved").unwrap_or(false),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_review(row: &tokio_postgres::Row) -> Review {
    Review {
        id: row.get("id"),
        business_id: row.get("business_id"),
        user_id: row.get("user_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        reply: row.get("reply"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_user_account(row: &tokio_postgres::Row) -> UserAccount {
    UserAccount {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        is_staff: row.get("is_staff"),
        date_joined: row.get("date_joined"),
    }
}

fn row_to_user_profile(row: &tokio_postgres::Row) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        phone: row.get("phone"),
        address: row.get("address"),
        bio: row.get("bio"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
