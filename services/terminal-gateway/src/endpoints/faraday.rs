use super::{get, method, MethodSpec, RestRoute};
use crate::proto::{frdrpc, Transcoder};

pub(super) const METHODS: &[MethodSpec] = &[
    method(
        "/frdrpc.FaradayServer/OutlierRecommendations",
        &[("recommendation", "read")],
    ),
    method(
        "/frdrpc.FaradayServer/ThresholdRecommendations",
        &[("recommendation", "read")],
    ),
    method(frdrpc::REVENUE_REPORT, &[("report", "read")]),
    method("/frdrpc.FaradayServer/ChannelInsights", &[("insights", "read")]),
    method("/frdrpc.FaradayServer/ExchangeRate", &[("rates", "read")]),
    method("/frdrpc.FaradayServer/NodeAudit", &[("audit", "read")]),
    method("/frdrpc.FaradayServer/CloseReport", &[("report", "read")]),
];

pub(super) fn rest_routes() -> Vec<RestRoute> {
    vec![get(
        "/v1/faraday/revenue",
        frdrpc::REVENUE_REPORT,
        Transcoder::of::<frdrpc::RevenueReportRequest, frdrpc::RevenueReportResponse>(),
    )]
}
