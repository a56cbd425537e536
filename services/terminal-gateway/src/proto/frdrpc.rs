//! Accounting daemon messages (`frdrpc`).

/// `/frdrpc.FaradayServer/RevenueReport`
pub const REVENUE_REPORT: &str = "/frdrpc.FaradayServer/RevenueReport";

tonic::include_proto!("frdrpc");
