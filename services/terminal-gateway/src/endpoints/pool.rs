use super::{get, method, MethodSpec, RestRoute};
use crate::proto::{poolrpc, Transcoder};

pub(super) const METHODS: &[MethodSpec] = &[
    method(
        poolrpc::GET_INFO,
        &[("account", "read"), ("order", "read"), ("auction", "read")],
    ),
    method("/poolrpc.Trader/ListAccounts", &[("account", "read")]),
    method("/poolrpc.Trader/InitAccount", &[("account", "write")]),
    method("/poolrpc.Trader/CloseAccount", &[("account", "write")]),
    method("/poolrpc.Trader/DepositAccount", &[("account", "write")]),
    method("/poolrpc.Trader/SubmitOrder", &[("order", "write")]),
    method("/poolrpc.Trader/ListOrders", &[("order", "read")]),
    method("/poolrpc.Trader/CancelOrder", &[("order", "write")]),
    method("/poolrpc.Trader/BatchSnapshot", &[("auction", "read")]),
    method("/poolrpc.Trader/AuctionFee", &[("auction", "read")]),
    method("/poolrpc.Trader/LeaseDurations", &[("auction", "read")]),
];

pub(super) fn rest_routes() -> Vec<RestRoute> {
    vec![get(
        "/v1/pool/info",
        poolrpc::GET_INFO,
        Transcoder::of::<poolrpc::GetInfoRequest, poolrpc::GetInfoResponse>(),
    )]
}
