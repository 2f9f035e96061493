mod middleware;
mod token;

pub use middleware::{AuthError, RequireAccount, RequireAdmin};
pub use token::{TokenGenerator, hash_password, parse_token, verify_password};
