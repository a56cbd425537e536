//! Liquidity marketplace daemon messages (`poolrpc`).

/// `/poolrpc.Trader/GetInfo`
pub const GET_INFO: &str = "/poolrpc.Trader/GetInfo";

tonic::include_proto!("poolrpc");
