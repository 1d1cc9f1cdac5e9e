//! Double-submit CSRF protection.
//!
//! The server sets a random `csrf_token` cookie; scripts read it and echo
//! it in the `x-csrf-token` header on every mutating request.

mod guard;
mod token;

pub use guard::{CsrfGuard, IssuedToken};
pub use token::{generate_token, tokens_match};
