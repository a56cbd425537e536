/// 64-bit integer fields rendered as JSON strings.
const INT64_FIELDS: &[&str] = &[
    ".lnrpc.GetInfoResponse.best_header_timestamp",
    ".lnrpc.Invoice.value",
    ".lnrpc.Invoice.value_msat",
    ".lnrpc.Invoice.expiry",
    ".lnrpc.AddInvoiceResponse.add_index",
    ".frdrpc.RevenueReportRequest.start_time",
    ".frdrpc.RevenueReportRequest.end_time",
    ".frdrpc.PairReport.amount_outgoing_msat",
    ".frdrpc.PairReport.fees_outgoing_msat",
    ".frdrpc.PairReport.amount_incoming_msat",
    ".frdrpc.PairReport.fees_incoming_msat",
    ".looprpc.SwapStatus.amt",
    ".looprpc.SwapStatus.initiation_time",
    ".looprpc.SwapStatus.last_update_time",
    ".looprpc.SwapStatus.cost_server",
    ".looprpc.SwapStatus.cost_onchain",
    ".looprpc.SwapStatus.cost_offchain",
    ".litrpc.Session.expiry_timestamp_seconds",
    ".litrpc.Session.created_at",
    ".litrpc.Session.macaroon_root_key_id",
    ".litrpc.Session.revoked_at",
    ".litrpc.AddSessionRequest.expiry_timestamp_seconds",
];

/// Bytes fields rendered as base64 JSON strings.
const BYTES_FIELDS: &[&str] = &[
    ".lnrpc.Invoice.r_preimage",
    ".lnrpc.AddInvoiceResponse.r_hash",
    ".lnrpc.AddInvoiceResponse.payment_addr",
    ".litrpc.Session.id",
    ".litrpc.RevokeSessionRequest.id",
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Backend surfaces are forwarded as raw bytes; only messages are generated
    let mut config = tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .message_attribute(
            ".",
            "#[derive(serde::Serialize, serde::Deserialize)] #[serde(default)]",
        );
    for field in INT64_FIELDS {
        config = config.field_attribute(field, r#"#[serde(with = "super::int64_string")]"#);
    }
    for field in BYTES_FIELDS {
        config = config.field_attribute(field, r#"#[serde(with = "super::base64_bytes")]"#);
    }
    config.compile_protos(
        &[
            "proto/lnrpc.proto",
            "proto/frdrpc.proto",
            "proto/looprpc.proto",
            "proto/poolrpc.proto",
            "proto/litrpc.proto",
        ],
        &["proto"],
    )?;

    // Identifier bodies are never rendered as JSON
    tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .compile_protos(&["proto/macaroon.proto"], &["proto"])?;

    Ok(())
}
