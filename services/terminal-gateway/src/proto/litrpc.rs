//! Session-management messages (`litrpc`), served by the gateway itself.

/// `/litrpc.Sessions/AddSession`
pub const ADD_SESSION: &str = "/litrpc.Sessions/AddSession";
/// `/litrpc.Sessions/ListSessions`
pub const LIST_SESSIONS: &str = "/litrpc.Sessions/ListSessions";
/// `/litrpc.Sessions/RevokeSession`
pub const REVOKE_SESSION: &str = "/litrpc.Sessions/RevokeSession";

tonic::include_proto!("litrpc");
