pub mod abi;
pub mod canonical;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod signer;

pub use constants::*;
pub use envelope::{BuildContext, Envelope, EnvelopeDraft};
pub use error::EnvelopeError;
pub use signer::GatewaySigner;
