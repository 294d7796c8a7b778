//! Request signing, dispatch, and response normalization.

pub mod request;
pub mod response;
pub mod signer;

pub use request::ApiRequest;
pub use response::{ContentKind, Document, Response};
pub use signer::{AuthMode, SignatureScheme};
