mod helpers;
mod jwt;
mod lockout;
mod middleware;
mod password;

pub use helpers::{AuthOutcome, AuthUser, TokenValidationError, authenticate, validate_bearer};
pub use jwt::{Claims, TOKEN_TTL_HOURS, TokenIssuer, generate_secret};
pub use lockout::LockoutTracker;
pub use middleware::{AuthError, RequireAdmin, RequireAgent, RequireCoordinator};
pub use password::{PasswordHasher, generate_password};
