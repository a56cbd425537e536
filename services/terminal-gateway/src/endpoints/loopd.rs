use super::{get, method, MethodSpec, RestRoute};
use crate::proto::{looprpc, Transcoder};

pub(super) const METHODS: &[MethodSpec] = &[
    method(
        "/looprpc.SwapClient/LoopOut",
        &[("swap", "execute"), ("loop", "out")],
    ),
    method(
        "/looprpc.SwapClient/LoopIn",
        &[("swap", "execute"), ("loop", "in")],
    ),
    method(looprpc::LIST_SWAPS, &[("swap", "read")]),
    method("/looprpc.SwapClient/SwapInfo", &[("swap", "read")]),
    method(
        "/looprpc.SwapClient/LoopOutTerms",
        &[("terms", "read"), ("loop", "out")],
    ),
    method(
        "/looprpc.SwapClient/LoopOutQuote",
        &[("terms", "read"), ("loop", "out")],
    ),
    method(
        "/looprpc.SwapClient/GetLoopInTerms",
        &[("terms", "read"), ("loop", "in")],
    ),
    method(
        "/looprpc.SwapClient/GetLoopInQuote",
        &[("terms", "read"), ("loop", "in")],
    ),
    method("/looprpc.SwapClient/GetLiquidityParams", &[("suggestions", "read")]),
    method("/looprpc.SwapClient/SetLiquidityParams", &[("suggestions", "write")]),
    method("/looprpc.SwapClient/SuggestSwaps", &[("suggestions", "read")]),
];

pub(super) fn rest_routes() -> Vec<RestRoute> {
    vec![get(
        "/v1/loop/swaps",
        looprpc::LIST_SWAPS,
        Transcoder::of::<looprpc::ListSwapsRequest, looprpc::ListSwapsResponse>(),
    )]
}
