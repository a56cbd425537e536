//! Swap daemon messages (`looprpc`).

/// `/looprpc.SwapClient/ListSwaps`
pub const LIST_SWAPS: &str = "/looprpc.SwapClient/ListSwaps";

tonic::include_proto!("looprpc");
