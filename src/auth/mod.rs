//! Authentication module
//!
//! A single configured API principal exchanges its password for a short-lived
//! bearer token; the analysis routes require that token.

mod jwt;
mod middleware;
mod password;

pub use jwt::{create_access_token, decode_token, Claims, TokenResponse};
pub use middleware::auth_middleware;
pub use password::{hash_password, verify_password};
