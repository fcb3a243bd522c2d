mod address_service;
mod post_service;
mod user_service;

pub use address_service::AddressService;
pub use post_service::PostService;
pub use user_service::UserService;
