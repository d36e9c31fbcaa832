//! Service wiring and the use cases the handlers call.
//!
//! Handlers stay thin: they authorize, decode, call one method here, and
//! encode. Everything that touches storage or credentials lives below.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::instrument;

use storefront_auth::{
    CredentialIssuer, CredentialPair, Hs256Credentials, PasswordPolicy, Registration,
    TokenValidator, User, authenticate, hash_password, username_taken,
};
use storefront_catalog::{NewProduct, Product, ProductChanges};
use storefront_core::{DomainError, Entity, FieldErrors, ProductId, StoreError, UserId};
use storefront_infra::{InMemoryStore, PostgresStore, Store};
use storefront_orders::{Order, OrderLineRequest, create_order};

use crate::app::errors::ApiError;
use crate::config::ApiConfig;

pub struct AppServices {
    store: Arc<dyn Store>,
    issuer: Arc<dyn CredentialIssuer>,
    tokens: Arc<dyn TokenValidator>,
    password_policy: PasswordPolicy,
}

/// Wire services from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise the in-memory store.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is not persisted)");
            Arc::new(InMemoryStore::new())
        }
    };
    Ok(AppServices::new(config, store))
}

impl AppServices {
    pub fn new(config: &ApiConfig, store: Arc<dyn Store>) -> Self {
        let credentials = Arc::new(
            Hs256Credentials::new(config.jwt_secret.as_bytes()).with_ttls(
                Duration::seconds(config.access_token_ttl_secs),
                Duration::seconds(config.refresh_token_ttl_secs),
            ),
        );
        Self {
            store,
            issuer: credentials.clone(),
            tokens: credentials,
            password_policy: config.password_policy.clone(),
        }
    }

    pub fn token_validator(&self) -> Arc<dyn TokenValidator> {
        Arc::clone(&self.tokens)
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    // -------------------------
    // Accounts
    // -------------------------

    /// Create an account and sign the new user in.
    #[instrument(skip(self, registration), fields(username = %registration.username()), err)]
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<(User, CredentialPair), ApiError> {
        let mut errors = match registration.validate(&self.password_policy) {
            Ok(()) => FieldErrors::new(),
            Err(DomainError::Validation(fields)) => fields,
            Err(other) => return Err(other.into()),
        };
        if errors.get("username").is_none()
            && self
                .store
                .find_by_username(registration.username())
                .await?
                .is_some()
        {
            errors.extend(field_errors(username_taken()));
        }
        errors.into_result()?;

        let password = registration.password().to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))??;

        let user = User::register(UserId::new(), &registration, hash, Utc::now());
        match self.store.insert_user(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration.
            Err(StoreError::Constraint(_)) => return Err(username_taken().into()),
            Err(e) => return Err(e.into()),
        }

        let tokens = self.issuer.issue(user.id(), user.username(), Utc::now())?;
        tracing::info!(user_id = %user.id(), "user registered");
        Ok((user, tokens))
    }

    #[instrument(skip(self, password), err)]
    pub async fn login(&self, username: &str, password: String) -> Result<CredentialPair, ApiError> {
        let user = self.store.find_by_username(username).await?;
        let user = tokio::task::spawn_blocking(move || {
            authenticate(user.as_ref(), &password).map(User::clone)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))??;

        Ok(self.issuer.issue(user.id(), user.username(), Utc::now())?)
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        Ok(self.issuer.refresh(refresh_token, Utc::now())?)
    }

    // -------------------------
    // Catalog
    // -------------------------

    pub async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        Ok(self.store.list_products().await?)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        self.store.get_product(id).await?.ok_or(ApiError::NotFound)
    }

    #[instrument(skip(self, new), fields(name = %new.name()), err)]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, ApiError> {
        let product = Product::create(ProductId::new(), new);
        self.store.insert_product(&product).await?;
        tracing::info!(product_id = %product.id(), "product created");
        Ok(product)
    }

    #[instrument(skip(self, changes), fields(product_id = %id), err)]
    pub async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Product, ApiError> {
        let current = self.get_product(id).await?;
        let updated = current.apply(changes)?;
        if !self.store.update_product(&updated).await? {
            return Err(ApiError::NotFound);
        }
        Ok(updated)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        match self.store.delete_product(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApiError::NotFound),
            Err(StoreError::Constraint(_)) => Err(ApiError::Conflict(
                "Cannot delete a product that existing orders reference.".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    // -------------------------
    // Orders
    // -------------------------

    pub async fn list_orders(&self, owner: UserId) -> Result<Vec<Order>, ApiError> {
        Ok(self.store.list_orders_for(owner).await?)
    }

    /// Price and persist an order in one transaction.
    #[instrument(skip(self, lines), fields(owner = %owner), err)]
    pub async fn place_order(
        &self,
        owner: UserId,
        lines: Vec<OrderLineRequest>,
    ) -> Result<Order, ApiError> {
        let mut tx = self.store.begin().await?;
        let order = create_order(&mut *tx, owner, &lines, Utc::now()).await?;
        tx.commit().await?;
        Ok(order)
    }
}

fn field_errors(err: DomainError) -> FieldErrors {
    match err {
        DomainError::Validation(fields) => fields,
        other => FieldErrors::single("non_field_errors", other.to_string()),
    }
}
