pub mod auth;
pub mod rate_limit;

pub use auth::{CustomerClaims, OptionalCustomer};
pub use rate_limit::rate_limit_middleware;
