//! Request authentication for the Apollo open API.
//!
//! Every outbound request for an application with a configured secret carries
//! two headers:
//!
//! - `Authorization: Apollo {appId}:{signature}`
//! - `Timestamp: {unix millis}`
//!
//! where the signature is a base64 HMAC-SHA1 over `"{timestamp}\n{pathWithQuery}"`.

mod secret;
mod signer;

pub use secret::Secret;
pub use signer::{
    AUTHORIZATION_HEADER, TIMESTAMP_HEADER, authorization_header, sign, signed_headers,
};
