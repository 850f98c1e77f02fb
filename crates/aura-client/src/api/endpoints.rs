//! Typed endpoint methods on [`ApiClient`].
//!
//! ## Endpoint Map
//! ```text
//! auth           POST /auth/register  POST /auth/login  POST /auth/logout
//!                POST /auth/refresh   GET  /auth/me
//! products       GET  /products       GET  /products/:id
//!                POST /products/:id/vote
//! orders         POST /orders         GET  /orders/my-orders
//!                PATCH /orders/:id/status   PATCH /orders/:id/cancel
//! reviews        GET  /reviews?productId=   POST /reviews
//! notifications  GET  /notifications
//! votes          GET  /votes
//! payments       POST /payments/initialize
//! admin          GET  /admin/stats  GET /admin/users  GET /admin/orders
//! ```

use aura_core::validation::{validate_comment, validate_email, validate_rating};
use aura_core::{
    AdminStats, CoreError, Money, NewOrder, NewReview, Notification, Order, OrderStatus,
    PaymentInitRequest, PaymentSession, Product, RegisterRequest, Review, User, Vote,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{decode, path_segment, ApiClient};
use crate::error::{ClientError, ClientResult};
use crate::transport::ApiRequest;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(alias = "token")]
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

/// `/auth/me` answers either with the user or with `{"user": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Nested { user: User },
    Flat(User),
}

fn validation(err: aura_core::ValidationError) -> ClientError {
    ClientError::Core(CoreError::Validation(err))
}

impl ApiClient {
    // =========================================================================
    // Auth
    // =========================================================================

    /// Creates an account and signs in with the returned tokens.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        validate_email(&request.email).map_err(validation)?;
        let body = serde_json::to_value(request)?;
        let response = self
            .send_public(ApiRequest::post("/auth/register", body))
            .await?;
        self.accept_auth(&response.body)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &SecretString) -> ClientResult<User> {
        validate_email(email).map_err(validation)?;
        let body = json!({ "email": email.trim(), "password": password.expose_secret() });
        let response = self.send_public(ApiRequest::post("/auth/login", body)).await?;
        self.accept_auth(&response.body)
    }

    /// Tells the server to end the session, then forgets local tokens no
    /// matter what the server said.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> ClientResult<()> {
        let mut request = ApiRequest::post("/auth/logout", json!({}));
        request.bearer = self.tokens().access_token();
        let result = if request.bearer.is_some() {
            self.send_public(request).await.map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = &result {
            warn!(error = %e, "Server logout failed; clearing local session anyway");
        }
        self.tokens().clear();
        result
    }

    /// Exchanges the stored refresh token for a new access token now,
    /// instead of waiting for a 401.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> ClientResult<()> {
        let current = self.tokens().access_token();
        self.refresh(current.as_ref()).await
    }

    #[instrument(skip(self))]
    pub async fn me(&self) -> ClientResult<User> {
        let me: MeResponse = self.fetch(ApiRequest::get("/auth/me")).await?;
        Ok(match me {
            MeResponse::Nested { user } | MeResponse::Flat(user) => user,
        })
    }

    fn accept_auth(&self, body: &str) -> ClientResult<User> {
        let auth: AuthResponse = decode(body)?;
        self.tokens().set(
            SecretString::from(auth.access_token),
            auth.refresh_token.map(SecretString::from),
        );
        info!(user_id = %auth.user.id, role = %auth.user.role, "Signed in");
        Ok(auth.user)
    }

    // =========================================================================
    // Products
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> ClientResult<Vec<Product>> {
        self.fetch(ApiRequest::get("/products")).await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &str) -> ClientResult<Product> {
        let id = path_segment(id)?;
        self.fetch(ApiRequest::get(format!("/products/{}", id))).await
    }

    /// Casts the user's vote for a new mix. The server allows one per user.
    #[instrument(skip(self, comment))]
    pub async fn vote_for_product(&self, product_id: &str, comment: Option<&str>) -> ClientResult<()> {
        let id = path_segment(product_id)?;
        validate_comment(comment).map_err(validation)?;
        self.send(ApiRequest::post(
            format!("/products/{}/vote", id),
            json!({ "comment": comment }),
        ))
        .await?;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    #[instrument(skip(self, order), fields(lines = order.items.len(), total = %order.total))]
    pub async fn create_order(&self, order: &NewOrder) -> ClientResult<Order> {
        let body = serde_json::to_value(order)?;
        self.fetch(ApiRequest::post("/orders", body)).await
    }

    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> ClientResult<Vec<Order>> {
        self.fetch(ApiRequest::get("/orders/my-orders")).await
    }

    /// Admin only.
    #[instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> ClientResult<()> {
        let id = path_segment(order_id)?;
        self.send(ApiRequest::patch(
            format!("/orders/{}/status", id),
            json!({ "status": status }),
        ))
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str) -> ClientResult<()> {
        let id = path_segment(order_id)?;
        self.send(ApiRequest::patch(format!("/orders/{}/cancel", id), json!({})))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Reviews, notifications, votes
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_reviews(&self, product_id: &str) -> ClientResult<Vec<Review>> {
        self.fetch(ApiRequest::get("/reviews").with_query("productId", product_id))
            .await
    }

    #[instrument(skip(self, review), fields(product_id = %review.product_id, rating = review.rating))]
    pub async fn create_review(&self, review: &NewReview) -> ClientResult<Review> {
        validate_rating(review.rating).map_err(validation)?;
        validate_comment(review.comment.as_deref()).map_err(validation)?;
        let body = serde_json::to_value(review)?;
        self.fetch(ApiRequest::post("/reviews", body)).await
    }

    #[instrument(skip(self))]
    pub async fn list_notifications(&self) -> ClientResult<Vec<Notification>> {
        self.fetch(ApiRequest::get("/notifications")).await
    }

    #[instrument(skip(self))]
    pub async fn list_votes(&self) -> ClientResult<Vec<Vote>> {
        self.fetch(ApiRequest::get("/votes")).await
    }

    /// The vote cast by `user_id`, if any.
    pub async fn my_vote(&self, user_id: &str) -> ClientResult<Option<Vote>> {
        let votes = self.list_votes().await?;
        Ok(votes
            .into_iter()
            .find(|vote| vote.user_id.as_deref() == Some(user_id)))
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Opens a gateway session for `amount`.
    #[instrument(skip(self, email), fields(amount = %amount))]
    pub async fn initialize_payment(&self, amount: Money, email: &str) -> ClientResult<PaymentSession> {
        let body = serde_json::to_value(PaymentInitRequest {
            amount: amount.minor(),
            email: email.to_string(),
        })?;
        self.fetch(ApiRequest::post("/payments/initialize", body)).await
    }

    // =========================================================================
    // Admin
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn admin_stats(&self) -> ClientResult<AdminStats> {
        self.fetch(ApiRequest::get("/admin/stats")).await
    }

    #[instrument(skip(self))]
    pub async fn admin_users(&self) -> ClientResult<Vec<User>> {
        self.fetch(ApiRequest::get("/admin/users")).await
    }

    #[instrument(skip(self))]
    pub async fn admin_orders(&self) -> ClientResult<Vec<Order>> {
        self.fetch(ApiRequest::get("/admin/orders")).await
    }
}
