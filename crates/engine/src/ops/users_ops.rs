use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter};

use crate::{EngineError, Money, ResultEngine, User, ledger, users, util::normalize_optional_text};

use super::Engine;

impl Engine {
    /// Open an account with a zero balance.
    ///
    /// Registration, passwords and OTP verification live in the auth layer;
    /// this only creates the ledger-side record.
    pub async fn create_user(&self, name: &str, email: &str) -> ResultEngine<User> {
        let name = normalize_optional_text(Some(name))
            .ok_or_else(|| EngineError::Validation("name must not be empty".to_string()))?;
        let email = normalize_optional_text(Some(email))
            .filter(|e| e.contains('@'))
            .ok_or_else(|| EngineError::Validation("email is not valid".to_string()))?
            .to_ascii_lowercase();

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::Validation(format!(
                "email {email} is already registered"
            )));
        }

        let model = users::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name),
            email: ActiveValue::Set(email),
            balance: ActiveValue::Set(0),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(&self.database)
        .await?;
        tracing::info!(user_id = model.id, "user created");
        Ok(User::from(model))
    }

    pub async fn user(&self, user_id: i32) -> ResultEngine<User> {
        self.require_user(&self.database, user_id).await
    }

    pub async fn balance(&self, user_id: i32) -> ResultEngine<Money> {
        ledger::balance(&self.database, user_id).await
    }
}
