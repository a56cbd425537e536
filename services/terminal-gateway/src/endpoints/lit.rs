use super::{get, method, MethodSpec, RestRoute};
use crate::proto::{litrpc, Transcoder};

pub(super) const METHODS: &[MethodSpec] = &[
    method(litrpc::ADD_SESSION, &[("sessions", "write")]),
    method(litrpc::LIST_SESSIONS, &[("sessions", "read")]),
    method(litrpc::REVOKE_SESSION, &[("sessions", "write")]),
];

pub(super) fn rest_routes() -> Vec<RestRoute> {
    vec![get(
        "/v1/sessions",
        litrpc::LIST_SESSIONS,
        Transcoder::of::<litrpc::ListSessionsRequest, litrpc::ListSessionsResponse>(),
    )]
}
