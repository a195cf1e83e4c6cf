//! Authentication system.
//!
//! Credentials are JWTs bound to Redis-backed session records. A request is
//! authenticated only when both checks pass: the token signature verifies
//! *and* the session record it names is still alive. Deleting the record
//! (logout, admin revocation) invalidates the token immediately, without
//! waiting for `exp`.
//!
//! The token is read from the `Authorization` header; a `Token ` or
//! `Bearer ` prefix is accepted (case-insensitive) and a bare token works
//! too.
//!
//! # Modules
//!
//! - [`current_user`]: extractors for getting the authenticated user in handlers
//! - [`password`]: password hashing and verification using Argon2
//! - [`session`]: Redis session store
//! - [`token`]: JWT creation and verification

pub mod current_user;
pub mod password;
pub mod session;
pub mod token;
