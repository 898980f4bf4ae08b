//! Token authentication: password hashing, token issuing and the request
//! extractors that resolve the calling user.

mod crypto;
mod extractor;

pub use crypto::{generate_token, hash_password, hash_token, verify_password};
pub use extractor::{AuthUser, MaybeUser};
