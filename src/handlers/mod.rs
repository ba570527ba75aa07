//! HTTP request handlers.
//!
//! Handlers extract the request (JSON body, path, query, [`AuthContext`]), call into
//! `services`, and return JSON. Business rules live in the services.
//!
//! [`AuthContext`]: crate::middleware::auth::AuthContext

pub mod health;
pub mod payments;
pub mod tudos;
pub mod wallet;
