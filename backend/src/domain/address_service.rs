use shared::{Address, CreateAddressRequest, UpdateAddressRequest};
use tracing::info;

use crate::db::DbConnection;
use crate::error::AppError;

/// Operations on addresses. A user owns at most one address, keyed by the
/// `user_id` foreign-key column; every lookup here goes through that column,
/// never through the address primary key, so the invariant holds even after
/// address ids and user ids diverge.
#[derive(Clone)]
pub struct AddressService {
    db: DbConnection,
}

impl AddressService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_user_id(&self, user_id: i64) -> Result<Address, AppError> {
        self.ensure_user(user_id).await?;

        self.db
            .get_address_by_user(user_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Address for user with ID {user_id} not found"))
            })
    }

    pub async fn create_address(
        &self,
        request: CreateAddressRequest,
    ) -> Result<Address, AppError> {
        self.ensure_user(request.user_id).await?;

        if self.db.get_address_by_user(request.user_id).await?.is_some() {
            return Err(AppError::AddressAlreadyExists(request.user_id));
        }

        let address = self.db.insert_address(&request).await?;
        info!("Created address {} for user {}", address.id, address.user_id);
        Ok(address)
    }

    /// Partial update: provided fields replace, absent fields keep their
    /// current values.
    pub async fn update_address(
        &self,
        user_id: i64,
        request: UpdateAddressRequest,
    ) -> Result<Address, AppError> {
        self.ensure_user(user_id).await?;

        let current = self.db.get_address_by_user(user_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Address for user with ID {user_id} not found"))
        })?;

        let street = request.street.unwrap_or_else(|| current.street.clone());
        let city = request.city.unwrap_or_else(|| current.city.clone());
        let state = request.state.unwrap_or_else(|| current.state.clone());
        let zip_code = request.zip_code.unwrap_or_else(|| current.zip_code.clone());

        let updated = self
            .db
            .update_address(&current, street, city, state, zip_code)
            .await?;
        info!("Updated address {} for user {}", updated.id, updated.user_id);
        Ok(updated)
    }

    async fn ensure_user(&self, user_id: i64) -> Result<(), AppError> {
        if self.db.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("User with ID {user_id} not found")))
        }
    }
}
