//! NETCONF sessions over ssh
//!
//! Implements the [`ncif_apply::Session`] seam by running the system `ssh`
//! client with the `netconf` subsystem and speaking base 1.0 framing over
//! its standard streams.

pub mod framing;
pub mod rpc;
pub mod ssh;

#[cfg(test)]
mod tests;

pub use framing::{FramedReader, END_OF_MESSAGE};
pub use ssh::{askpass_response, FailureClassifier, SshConnector, SshOptions, SshSession, ASKPASS_ENV};
