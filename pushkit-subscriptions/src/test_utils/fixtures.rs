//! Canned protocol values.

use pushkit_lib::{Account, AgreementPublicKey, AppMetadata, RpcRequest};

use crate::protocol::PUSH_REQUEST;
use crate::types::PushRequestParams;

pub const ACCOUNT: &str = "eip155:1:0xab16a96d359ec26a11e2c2b3d8f8b8942d5bfcdb";

pub fn account() -> Account {
    Account::new(ACCOUNT).expect("fixture account is valid")
}

pub fn metadata() -> AppMetadata {
    AppMetadata::new("Gm Dapp", "https://gm.walletconnect.com")
        .with_description("Gm notifications")
        .with_icon("https://gm.walletconnect.com/icon.png")
}

/// A `wc_pushRequest` carrying `public_key`.
pub fn push_request(public_key: &AgreementPublicKey) -> RpcRequest {
    let params = PushRequestParams {
        public_key: public_key.to_hex(),
        metadata: metadata(),
        account: account(),
    };
    RpcRequest::new(PUSH_REQUEST.method, params).expect("fixture params serialize")
}
