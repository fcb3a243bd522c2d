use shared::{CreateUserRequest, Pagination, User};
use tracing::info;

use crate::db::DbConnection;
use crate::error::AppError;

/// Operations on users: paginated listing, counting, lookup and creation.
#[derive(Clone)]
pub struct UserService {
    db: DbConnection,
}

impl UserService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// One page of users, newest first, each joined with its address.
    pub async fn list_users(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<User>, Pagination), AppError> {
        // Saturate so an absurdly large page lands past the end instead of
        // overflowing the multiply
        let offset = page.saturating_mul(limit);
        let total = self.db.count_users().await?;
        let users = self.db.list_users(limit, offset).await?;

        info!(
            "Listed {} users (page {}, limit {}, total {})",
            users.len(),
            page,
            limit,
            total
        );

        Ok((users, Pagination::new(page, limit, total)))
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        Ok(self.db.count_users().await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, AppError> {
        self.db
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with ID {id} not found")))
    }

    /// Create a user; the email must not already be registered.
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, AppError> {
        if self.db.email_exists(&request.email).await? {
            return Err(AppError::DuplicateEmail);
        }

        let user = self.db.insert_user(&request).await?;
        info!("Created user {} ({})", user.id, user.email);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_service() -> UserService {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        UserService::new(db)
    }

    fn user_request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            first_name: "John".to_string(),
            last_name: "Boy".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_roundtrip() {
        let service = create_test_service().await;

        let created = service
            .create_user(user_request("johnny.boy@gmail.com"))
            .await
            .unwrap();
        assert_eq!(created.first_name, "John");
        assert_eq!(created.last_name, "Boy");
        assert_eq!(created.email, "johnny.boy@gmail.com");

        let fetched = service.get_user(created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_creates_no_record() {
        let service = create_test_service().await;

        service.create_user(user_request("dup@gmail.com")).await.unwrap();

        let err = service
            .create_user(user_request("dup@gmail.com"))
            .await
            .expect_err("Duplicate email must be rejected");
        assert!(matches!(err, AppError::DuplicateEmail));

        assert_eq!(service.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_user_is_not_found() {
        let service = create_test_service().await;

        let err = service.get_user(999).await.expect_err("No such user");
        match err {
            AppError::NotFound(message) => {
                assert_eq!(message, "User with ID 999 not found");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_pagination_boundaries() {
        let service = create_test_service().await;

        for i in 0..3 {
            service
                .create_user(user_request(&format!("user{i}@gmail.com")))
                .await
                .unwrap();
        }

        let (first_page, pagination) = service.list_users(0, 2).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(pagination.total, 3);
        assert_eq!(pagination.total_pages, 2);
        assert!(pagination.has_next);
        assert!(!pagination.has_prev);
        // Newest first
        assert_eq!(first_page[0].email, "user2@gmail.com");

        let (second_page, pagination) = service.list_users(1, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert!(!pagination.has_next);
        assert!(pagination.has_prev);
        assert_eq!(second_page[0].email, "user0@gmail.com");
    }

    #[tokio::test]
    async fn test_huge_page_number_is_an_empty_page() {
        let service = create_test_service().await;

        service.create_user(user_request("lone@gmail.com")).await.unwrap();

        let (users, pagination) = service.list_users(i64::MAX, 10).await.unwrap();
        assert!(users.is_empty());
        assert_eq!(pagination.total, 1);
        assert!(!pagination.has_next);
        assert!(pagination.has_prev);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let service = create_test_service().await;

        service.create_user(user_request("solo@gmail.com")).await.unwrap();

        let (users, pagination) = service.list_users(5, 10).await.unwrap();
        assert!(users.is_empty());
        assert!(!pagination.has_next);
        assert!(pagination.has_prev);
    }
}
