//! Session management
//!
//! The gateway's own `litrpc.Sessions` surface. A session is a labelled
//! super macaroon with an expiry, baked under a root key derived from the
//! session ID so that revoking the session revokes the token.

mod service;
mod store;

pub use service::SessionService;
pub use store::{SessionError, SessionId, SessionRecord, SessionStore};
