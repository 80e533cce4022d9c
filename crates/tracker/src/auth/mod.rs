mod jwt;
mod middleware;
mod password;
mod rate_limit;
mod validation;

pub use jwt::{AccessTokenDetails, IssuedToken, JwtError, JwtService, token_hash};
pub use middleware::{RequestContext, require_session};
pub use password::{PasswordHashError, hash_password, verify_password};
pub use rate_limit::{RateLimitDecision, RateLimiter, enforce_rate_limit};
pub use validation::{normalize_email, validate_email, validate_name, validate_password};
