//! Core node daemon messages (`lnrpc`).

/// `/lnrpc.Lightning/GetInfo`
pub const GET_INFO: &str = "/lnrpc.Lightning/GetInfo";
/// `/lnrpc.Lightning/AddInvoice`
pub const ADD_INVOICE: &str = "/lnrpc.Lightning/AddInvoice";
/// `/lnrpc.Lightning/BakeMacaroon`
pub const BAKE_MACAROON: &str = "/lnrpc.Lightning/BakeMacaroon";
/// `/lnrpc.Lightning/CheckMacaroonPermissions`
pub const CHECK_MACAROON_PERMISSIONS: &str = "/lnrpc.Lightning/CheckMacaroonPermissions";

tonic::include_proto!("lnrpc");

impl From<&crate::permission::Permission> for MacaroonPermission {
    fn from(permission: &crate::permission::Permission) -> Self {
        Self {
            entity: permission.entity.clone(),
            action: permission.action.clone(),
        }
    }
}
