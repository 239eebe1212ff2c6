//! Users and items
//!
//! Plain relational writes; nothing here is recorded on the ledger.

use crate::context::CoreContext;
use crate::locks::LockKey;
use crate::store::{Mutation, StoreTx};
use crate::types::{Actor, Item, ItemId, Role, User, UserId};
use crate::{Error, Result};
use chrono::Utc;
use rust_decimal::Decimal;

/// Registration data for a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Login email, unique case-insensitively
    pub email: String,
    /// Role
    pub role: Role,
    /// Shipping or business address
    pub address: String,
    /// Opening wallet balance
    pub opening_balance: Decimal,
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New name
    pub name: Option<String>,
    /// New address
    pub address: Option<String>,
}

/// Listing data for a new item
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Unit price
    pub price: Decimal,
    /// Units in stock
    pub stock: u32,
}

/// Item fields a seller may change
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New unit price
    pub price: Option<Decimal>,
    /// New stock level
    pub stock: Option<u32>,
}

/// User and item catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    ctx: CoreContext,
}

impl Catalog {
    /// Create catalog
    pub fn new(ctx: CoreContext) -> Self {
        Self { ctx }
    }

    /// Register a user
    pub fn register_user(&self, new: NewUser) -> Result<User> {
        let name = non_empty("name", &new.name)?;
        let email = new.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(Error::Validation(format!("Invalid email: {}", new.email)));
        }
        if new.opening_balance < Decimal::ZERO {
            return Err(Error::Validation(
                "Opening balance must not be negative".to_string(),
            ));
        }

        let user = User {
            id: UserId::generate(),
            name,
            email,
            role: new.role,
            address: new.address.trim().to_string(),
            wallet_balance: new.opening_balance,
            created_at: Utc::now(),
        };

        self.ctx
            .store
            .commit(StoreTx::new().with(Mutation::InsertUser(user.clone())))?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Change the actor's own name or address
    pub fn update_profile(
        &self,
        actor: &Actor,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<User> {
        if actor.user_id != *user_id {
            return Err(Error::Unauthorized(format!(
                "{} cannot edit the profile of {}",
                actor.user_id, user_id
            )));
        }

        let name = update
            .name
            .as_deref()
            .map(|name| non_empty("name", name))
            .transpose()?;

        self.ctx.store.commit(StoreTx::new().with(Mutation::UpdateProfile {
            user_id: user_id.clone(),
            name,
            address: update.address.map(|a| a.trim().to_string()),
        }))?;

        self.ctx.store.user(user_id)
    }

    /// User by id
    pub fn user(&self, user_id: &UserId) -> Result<User> {
        self.ctx.store.user(user_id)
    }

    /// User by email
    pub fn user_by_email(&self, email: &str) -> Result<User> {
        self.ctx
            .store
            .user_by_email(email)?
            .ok_or_else(|| Error::not_found("user", email))
    }

    /// List an item for sale
    pub fn create_item(&self, actor: &Actor, new: NewItem) -> Result<Item> {
        if actor.role != Role::Seller {
            return Err(Error::Unauthorized(format!(
                "{} cannot list items",
                actor.role
            )));
        }
        check_price(new.price)?;

        let item = Item {
            id: ItemId::generate(),
            seller_id: actor.user_id.clone(),
            name: non_empty("name", &new.name)?,
            description: new.description.trim().to_string(),
            price: new.price,
            stock: new.stock,
            created_at: Utc::now(),
        };

        self.ctx
            .store
            .commit(StoreTx::new().with(Mutation::InsertItem(item.clone())))?;

        tracing::info!(item_id = %item.id, seller_id = %item.seller_id, "Item listed");
        Ok(item)
    }

    /// Edit an item the actor sells
    pub async fn update_item(
        &self,
        actor: &Actor,
        item_id: &ItemId,
        update: ItemUpdate,
    ) -> Result<Item> {
        // absolute stock writes must not interleave with order placement
        let _locks = self.ctx.locks.acquire([LockKey::item(item_id)]).await;

        let mut item = self.ctx.store.item(item_id)?;
        if actor.role != Role::Seller || item.seller_id != actor.user_id {
            return Err(Error::Unauthorized(format!(
                "{} does not sell item {}",
                actor.user_id, item_id
            )));
        }

        if let Some(name) = update.name {
            item.name = non_empty("name", &name)?;
        }
        if let Some(description) = update.description {
            item.description = description.trim().to_string();
        }
        if let Some(price) = update.price {
            check_price(price)?;
            item.price = price;
        }
        if let Some(stock) = update.stock {
            item.stock = stock;
        }

        self.ctx
            .store
            .commit(StoreTx::new().with(Mutation::UpdateItem(item.clone())))?;

        tracing::info!(item_id = %item.id, "Item updated");
        Ok(item)
    }

    /// Item by id
    pub fn item(&self, item_id: &ItemId) -> Result<Item> {
        self.ctx.store.item(item_id)
    }

    /// Items listed by one seller, newest first
    pub fn items_by_seller(&self, seller_id: &UserId) -> Result<Vec<Item>> {
        let mut items: Vec<Item> = self
            .ctx
            .store
            .items()?
            .into_iter()
            .filter(|item| item.seller_id == *seller_id)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Every listed item, newest first
    pub fn all_items(&self) -> Result<Vec<Item>> {
        let mut items = self.ctx.store.items()?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn check_price(price: Decimal) -> Result<()> {
    if price < Decimal::ZERO {
        return Err(Error::Validation(format!(
            "Price must not be negative, got {}",
            price
        )));
    }
    Ok(())
}
