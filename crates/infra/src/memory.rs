//! In-memory store for tests/dev.
//!
//! One async mutex guards all state. An order transaction holds the lock
//! from `begin` until it is committed or dropped, so placements are
//! serialized and priced products cannot change underneath them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_auth::User;
use storefront_catalog::Product;
use storefront_core::{Entity, ProductId, StoreError, UserId};
use storefront_orders::{Order, OrderUnitOfWork};

use crate::repository::{OrderRepository, OrderTransaction, ProductRepository, UserRepository};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    // Keyed by UUIDv7, so iteration is creation order.
    products: BTreeMap<ProductId, Product>,
    orders: Vec<Order>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username() == user.username()) {
            return Err(StoreError::Constraint(format!(
                "username '{}' already exists",
                user.username()
            )));
        }
        state.users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username() == username).cloned())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.state.lock().await.products.values().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id()) {
            return Err(StoreError::Constraint(format!(
                "product {} already exists",
                product.id()
            )));
        }
        state.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&product.id()) {
            Some(slot) => {
                *slot = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Ok(false);
        }
        if state.orders.iter().any(|o| o.references(id)) {
            return Err(StoreError::Constraint(format!(
                "product {id} is referenced by existing orders"
            )));
        }
        state.products.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn list_orders_for(&self, owner: UserId) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.owner() == owner)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(orders)
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(InMemoryOrderTransaction {
            state: guard,
            staged: Vec::new(),
        }))
    }
}

struct InMemoryOrderTransaction {
    state: OwnedMutexGuard<State>,
    staged: Vec<Order>,
}

#[async_trait]
impl OrderUnitOfWork for InMemoryOrderTransaction {
    async fn product_for_pricing(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.products.get(&id).cloned())
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if !self.state.users.contains_key(&order.owner()) {
            return Err(StoreError::Constraint(format!(
                "order owner {} does not exist",
                order.owner()
            )));
        }
        self.staged.push(order.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderTransaction for InMemoryOrderTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryOrderTransaction { mut state, staged } = *self;
        state.orders.extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use storefront_auth::Registration;
    use storefront_catalog::NewProduct;
    use storefront_core::Money;
    use storefront_orders::{OrderLineRequest, create_order};

    async fn seed_user(store: &InMemoryStore, name: &str) -> UserId {
        let reg = Registration::new(name, "", "pw", "pw");
        let user = User::register(UserId::new(), &reg, "hash".to_string(), Utc::now());
        store.insert_user(&user).await.unwrap();
        user.id()
    }

    async fn seed_product(store: &InMemoryStore, price: &str) -> ProductId {
        let new = NewProduct::new("Test Product", "", Money::parse(price).unwrap(), "Test").unwrap();
        let product = Product::create(ProductId::new(), new);
        store.insert_product(&product).await.unwrap();
        product.id()
    }

    #[tokio::test]
    async fn duplicate_username_is_a_constraint_error() {
        let store = InMemoryStore::new();
        seed_user(&store, "alice").await;

        let reg = Registration::new("alice", "", "pw", "pw");
        let again = User::register(UserId::new(), &reg, "hash".to_string(), Utc::now());
        assert!(matches!(
            store.insert_user(&again).await,
            Err(StoreError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn committed_order_is_listed_for_its_owner_only() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let product = seed_product(&store, "10.99").await;

        let mut tx = store.begin().await.unwrap();
        let order = create_order(
            &mut *tx,
            alice,
            &[OrderLineRequest::new(product, Some(2))],
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.list_orders_for(alice).await.unwrap(), vec![order]);
        assert!(store.list_orders_for(bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_transaction_persists_nothing() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let product = seed_product(&store, "1.00").await;

        {
            let mut tx = store.begin().await.unwrap();
            create_order(
                &mut *tx,
                alice,
                &[OrderLineRequest::new(product, None)],
                Utc::now(),
            )
            .await
            .unwrap();
        }

        assert!(store.list_orders_for(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orders_are_listed_newest_first() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let product = seed_product(&store, "1.00").await;
        let now = Utc::now();

        for offset in [0, 2, 1] {
            let mut tx = store.begin().await.unwrap();
            create_order(
                &mut *tx,
                alice,
                &[OrderLineRequest::new(product, Some(1))],
                now + Duration::seconds(offset),
            )
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let listed: Vec<_> = store
            .list_orders_for(alice)
            .await
            .unwrap()
            .iter()
            .map(|o| o.created_at())
            .collect();
        assert_eq!(
            listed,
            vec![
                now + Duration::seconds(2),
                now + Duration::seconds(1),
                now
            ]
        );
    }

    #[tokio::test]
    async fn referenced_product_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let ordered = seed_product(&store, "3.00").await;
        let unused = seed_product(&store, "4.00").await;

        let mut tx = store.begin().await.unwrap();
        create_order(
            &mut *tx,
            alice,
            &[OrderLineRequest::new(ordered, Some(1))],
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(
            store.delete_product(ordered).await,
            Err(StoreError::Constraint(_))
        ));
        assert_eq!(store.delete_product(unused).await, Ok(true));
        assert_eq!(store.delete_product(unused).await, Ok(false));
        assert!(store.get_product(ordered).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_reports_missing_products() {
        let store = InMemoryStore::new();
        let new = NewProduct::new("Ghost", "", Money::ZERO, "None").unwrap();
        let ghost = Product::create(ProductId::new(), new);
        assert_eq!(store.update_product(&ghost).await, Ok(false));
    }
}
