//! NETCONF interface configuration documents
//!
//! Reply decoding, payload encoding, desired state and filter sources, and
//! process settings.

pub mod decoder;
pub mod encoder;
pub mod schema;
pub mod settings;
pub mod state;
pub mod tree;


pub use decoder::{decode, ResponseDecoder};
pub use encoder::{encode, PayloadEncoder};
pub use schema::{DocumentPath, EncoderOptions};
pub use settings::Settings;
pub use state::{load_desired_state, load_filter, parse_desired_state, StateFile};
