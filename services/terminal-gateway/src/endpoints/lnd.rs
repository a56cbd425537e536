use super::{get, method, post, MethodSpec, RestRoute};
use crate::proto::{lnrpc, Transcoder};

pub(super) const METHODS: &[MethodSpec] = &[
    method(lnrpc::GET_INFO, &[("info", "read")]),
    method("/lnrpc.Lightning/GetRecoveryInfo", &[("info", "read")]),
    method("/lnrpc.Lightning/WalletBalance", &[("onchain", "read")]),
    method("/lnrpc.Lightning/ChannelBalance", &[("offchain", "read")]),
    method("/lnrpc.Lightning/GetTransactions", &[("onchain", "read")]),
    method("/lnrpc.Lightning/EstimateFee", &[("onchain", "read")]),
    method("/lnrpc.Lightning/SendCoins", &[("onchain", "write")]),
    method("/lnrpc.Lightning/NewAddress", &[("address", "write")]),
    method("/lnrpc.Lightning/ListPeers", &[("peers", "read")]),
    method("/lnrpc.Lightning/ConnectPeer", &[("peers", "write")]),
    method("/lnrpc.Lightning/DisconnectPeer", &[("peers", "write")]),
    method("/lnrpc.Lightning/ListChannels", &[("offchain", "read")]),
    method("/lnrpc.Lightning/PendingChannels", &[("offchain", "read")]),
    method("/lnrpc.Lightning/ClosedChannels", &[("offchain", "read")]),
    method(
        "/lnrpc.Lightning/OpenChannelSync",
        &[("onchain", "write"), ("offchain", "write")],
    ),
    method(
        "/lnrpc.Lightning/SendPaymentSync",
        &[("offchain", "write")],
    ),
    method(lnrpc::ADD_INVOICE, &[("invoices", "write")]),
    method("/lnrpc.Lightning/ListInvoices", &[("invoices", "read")]),
    method("/lnrpc.Lightning/LookupInvoice", &[("invoices", "read")]),
    method("/lnrpc.Lightning/ListPayments", &[("offchain", "read")]),
    method("/lnrpc.Lightning/DescribeGraph", &[("info", "read")]),
    method("/lnrpc.Lightning/FeeReport", &[("offchain", "read")]),
    method(lnrpc::BAKE_MACAROON, &[("macaroon", "generate")]),
    method("/lnrpc.Lightning/ListPermissions", &[("info", "read")]),
    method(lnrpc::CHECK_MACAROON_PERMISSIONS, &[("macaroon", "read")]),
    method("/routerrpc.Router/EstimateRouteFee", &[("offchain", "read")]),
];

pub(super) fn rest_routes() -> Vec<RestRoute> {
    vec![
        get(
            "/v1/getinfo",
            lnrpc::GET_INFO,
            Transcoder::of::<lnrpc::GetInfoRequest, lnrpc::GetInfoResponse>(),
        ),
        post(
            "/v1/invoices",
            lnrpc::ADD_INVOICE,
            Transcoder::of::<lnrpc::Invoice, lnrpc::AddInvoiceResponse>(),
        ),
    ]
}
