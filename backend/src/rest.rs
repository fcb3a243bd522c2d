use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use shared::{
    CreateAddressRequest, CreatePostRequest, CreateUserRequest, UpdateAddressRequest,
};
use tracing::info;

use crate::db::DbConnection;
use crate::domain::{AddressService, PostService, UserService};
use crate::error::AppError;
use crate::response;
use crate::validation;

const DEFAULT_PAGE: i64 = 0;
const DEFAULT_PAGE_SIZE: i64 = 10;

/// Application state shared across handlers: one service per entity, all
/// cloning the same pooled connection.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub addresses: AddressService,
    pub posts: PostService,
}

impl AppState {
    pub fn new(db: DbConnection) -> Self {
        Self {
            users: UserService::new(db.clone()),
            addresses: AddressService::new(db.clone()),
            posts: PostService::new(db),
        }
    }
}

/// Build the application router. Unmatched paths fall through to a 404
/// error envelope.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/count", get(get_user_count))
        .route("/users/:id", get(get_user_by_id))
        .route("/addresses", get(get_address_by_user_id).post(create_address))
        .route("/addresses/:user_id", patch(update_address))
        .route("/posts", get(get_posts_by_user_id).post(create_post))
        .route("/posts/:id", delete(delete_post))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    page_number: Option<String>,
    page_size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    user_id: Option<String>,
}

/// GET /users?pageNumber&pageSize
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Response, AppError> {
    info!("GET /users - query: {:?}", query);

    // Missing or unusable values fall back to the defaults rather than erroring
    let page = query
        .page_number
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(DEFAULT_PAGE);
    let limit = query
        .page_size
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let (users, pagination) = state.users.list_users(page, limit).await?;
    Ok(response::paginated(
        "Users retrieved successfully",
        users,
        pagination,
    ))
}

/// GET /users/count
async fn get_user_count(State(state): State<AppState>) -> Result<Response, AppError> {
    info!("GET /users/count");

    let count = state.users.count_users().await?;
    Ok(response::success(
        StatusCode::OK,
        "User count retrieved successfully",
        serde_json::json!({ "count": count }),
    ))
}

/// GET /users/:id
async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    info!("GET /users/{}", id);

    let id = parse_id(&id, "Invalid user ID. Please provide a valid ID.")?;
    let user = state.users.get_user(id).await?;
    Ok(response::success(
        StatusCode::OK,
        "User retrieved successfully",
        user,
    ))
}

/// POST /users
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    info!("POST /users");

    validation::validate(validation::USER_RULES, &body)?;
    let request: CreateUserRequest = parse_body(body)?;

    let user = state.users.create_user(request).await?;
    Ok(response::success(
        StatusCode::CREATED,
        "User created successfully",
        user,
    ))
}

/// GET /addresses?userId
async fn get_address_by_user_id(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> Result<Response, AppError> {
    info!("GET /addresses - query: {:?}", query);

    let user_id = query
        .user_id
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| AppError::InvalidArgument("User ID is required".to_string()))?;

    let address = state.addresses.get_by_user_id(user_id).await?;
    Ok(response::success(
        StatusCode::OK,
        "Address retrieved successfully",
        address,
    ))
}

/// POST /addresses
async fn create_address(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    info!("POST /addresses");

    validation::validate(validation::ADDRESS_RULES, &body)?;
    let request: CreateAddressRequest = parse_body(body)?;

    let address = state.addresses.create_address(request).await?;
    Ok(response::success(
        StatusCode::CREATED,
        "Address created successfully",
        address,
    ))
}

/// PATCH /addresses/:user_id - the path parameter is the owning USER's id
async fn update_address(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    info!("PATCH /addresses/{}", user_id);

    let user_id = parse_id(&user_id, "Invalid user ID. Please provide a valid ID.")?;
    let request: UpdateAddressRequest = parse_body(body)?;

    let address = state.addresses.update_address(user_id, request).await?;
    Ok(response::success(
        StatusCode::OK,
        "Address updated successfully",
        address,
    ))
}

/// GET /posts?userId
async fn get_posts_by_user_id(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> Result<Response, AppError> {
    info!("GET /posts - query: {:?}", query);

    let user_id = query
        .user_id
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            AppError::InvalidArgument("Invalid user ID. Please provide a valid ID.".to_string())
        })?;

    let posts = state.posts.list_by_user_id(user_id).await?;
    Ok(response::success(
        StatusCode::OK,
        "Posts retrieved successfully",
        posts,
    ))
}

/// POST /posts
async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    info!("POST /posts");

    validation::validate(validation::POST_RULES, &body)?;
    let request: CreatePostRequest = parse_body(body)?;

    let post = state.posts.create_post(request).await?;
    Ok(response::success(
        StatusCode::CREATED,
        "Post created successfully",
        post,
    ))
}

/// DELETE /posts/:id
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    info!("DELETE /posts/{}", id);

    let id = parse_id(&id, "Invalid post ID. Please provide a valid ID.")?;
    state.posts.delete_post(id).await?;
    Ok(response::success(
        StatusCode::OK,
        "Post deleted successfully",
        serde_json::json!({ "deleted": true }),
    ))
}

/// Fallback for unmatched routes.
async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Not Found - {uri}"))
}

fn parse_id(raw: &str, message: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::InvalidArgument(message.to_string()))
}

/// Deserialize an already-validated body into its typed request.
fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        router(AppState::new(db))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("Request should not fail at the transport level");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let body = serde_json::from_slice(&bytes).expect("Response body was not JSON");
        (status, body)
    }

    fn user_body(email: &str) -> Value {
        serde_json::json!({
            "firstName": "John",
            "lastName": "Boy",
            "email": email,
        })
    }

    async fn create_test_user(app: &Router, email: &str) -> i64 {
        let (status, body) = send(app, json_request("POST", "/users", user_body(email))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_i64().expect("Created user has an id")
    }

    #[tokio::test]
    async fn test_create_user_returns_201_envelope() {
        let app = test_app().await;

        let (status, body) =
            send(&app, json_request("POST", "/users", user_body("johnny.boy@gmail.com"))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"]["firstName"], "John");
        assert_eq!(body["data"]["lastName"], "Boy");
        assert_eq!(body["data"]["email"], "johnny.boy@gmail.com");
    }

    #[tokio::test]
    async fn test_create_user_collects_all_validation_failures() {
        let app = test_app().await;

        let (status, body) =
            send(&app, json_request("POST", "/users", serde_json::json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"]["firstName"], "First name is required");
        assert_eq!(body["errors"]["lastName"], "Last name is required");
        assert_eq!(body["errors"]["email"], "Must be a valid email address");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let app = test_app().await;
        create_test_user(&app, "dup@gmail.com").await;

        let (status, body) =
            send(&app, json_request("POST", "/users", user_body("dup@gmail.com"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email already in use");
    }

    #[tokio::test]
    async fn test_list_users_pagination_metadata() {
        let app = test_app().await;
        for i in 0..3 {
            create_test_user(&app, &format!("user{i}@gmail.com")).await;
        }

        let (status, body) = send(&app, get_request("/users?pageNumber=0&pageSize=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["pagination"]["total"], 3);
        assert_eq!(body["pagination"]["totalPages"], 2);
        assert_eq!(body["pagination"]["hasNext"], true);
        assert_eq!(body["pagination"]["hasPrev"], false);
        // Newest first
        assert_eq!(body["data"][0]["email"], "user2@gmail.com");

        let (_, body) = send(&app, get_request("/users?pageNumber=1&pageSize=2")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["pagination"]["hasNext"], false);
        assert_eq!(body["pagination"]["hasPrev"], true);
    }

    #[tokio::test]
    async fn test_list_users_falls_back_to_defaults_on_garbage() {
        let app = test_app().await;
        create_test_user(&app, "solo@gmail.com").await;

        let (status, body) =
            send(&app, get_request("/users?pageNumber=abc&pageSize=nope")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["page"], 0);
        assert_eq!(body["pagination"]["limit"], 10);
    }

    #[tokio::test]
    async fn test_get_user_count() {
        let app = test_app().await;
        create_test_user(&app, "one@gmail.com").await;
        create_test_user(&app, "two@gmail.com").await;

        let (status, body) = send(&app, get_request("/users/count")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 2);
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let app = test_app().await;
        let id = create_test_user(&app, "findme@gmail.com").await;

        let (status, body) = send(&app, get_request(&format!("/users/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], id);
        assert_eq!(body["data"]["email"], "findme@gmail.com");
    }

    #[tokio::test]
    async fn test_get_user_with_bad_id_is_400() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/users/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid user ID. Please provide a valid ID.");
    }

    #[tokio::test]
    async fn test_get_missing_user_is_404() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/users/999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User with ID 999 not found");
    }

    #[tokio::test]
    async fn test_address_flow() {
        let app = test_app().await;
        let user_id = create_test_user(&app, "resident@gmail.com").await;

        // No userId query parameter
        let (status, body) = send(&app, get_request("/addresses")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "User ID is required");

        // No address yet
        let (status, _) = send(&app, get_request(&format!("/addresses?userId={user_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let address = serde_json::json!({
            "street": "AJ street",
            "city": "Lagos",
            "state": "LG",
            "zipCode": "12345",
            "userId": user_id,
        });
        let (status, body) = send(&app, json_request("POST", "/addresses", address.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["city"], "Lagos");
        assert_eq!(body["data"]["userId"], user_id);

        // Second create conflicts
        let (status, body) = send(&app, json_request("POST", "/addresses", address)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            format!("User with ID {user_id} already has an address")
        );

        // Partial update replaces only the provided field
        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                &format!("/addresses/{user_id}"),
                serde_json::json!({"street": "New street"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["street"], "New street");
        assert_eq!(body["data"]["city"], "Lagos");

        let (status, body) = send(&app, get_request(&format!("/addresses?userId={user_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["street"], "New street");
    }

    #[tokio::test]
    async fn test_create_address_for_missing_user_is_404() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/addresses",
                serde_json::json!({
                    "street": "AJ street",
                    "city": "Lagos",
                    "state": "LG",
                    "zipCode": "12345",
                    "userId": 42,
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User with ID 42 not found");
    }

    #[tokio::test]
    async fn test_posts_flow() {
        let app = test_app().await;
        let user_id = create_test_user(&app, "author@gmail.com").await;

        // Zero posts is a success with an empty collection
        let (status, body) = send(&app, get_request(&format!("/posts?userId={user_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(body["data"].as_array().unwrap().is_empty());

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/posts",
                serde_json::json!({
                    "title": "Test Post",
                    "body": "This is a test post body with some content.",
                    "userId": user_id,
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let post_id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/posts/{post_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);

        // Deleting again is a 404
        let (status, body) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/posts/{post_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], format!("Post with ID {post_id} not found"));
    }

    #[tokio::test]
    async fn test_create_post_validation() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/posts",
                serde_json::json!({"title": "No body", "userId": "nope"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["body"], "Body is required");
        assert_eq!(body["errors"]["userId"], "User ID must be a number");
        assert!(body["errors"].get("title").is_none());
    }

    #[tokio::test]
    async fn test_unmatched_route_is_404_envelope() {
        let app = test_app().await;

        let (status, body) = send(&app, get_request("/nowhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Not Found - /nowhere");
    }
}
