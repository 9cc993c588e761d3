pub mod error;
pub mod interface;
pub mod kind;
pub mod protocol;
pub mod transaction;

pub use error::{SharedResult, SharedTypeError};
pub use interface::{ConfigObject, ConfigSet, Ipv4Address};
pub use kind::ErrorKind;
pub use protocol::{Datastore, Filter};
pub use transaction::{TransactionOutcome, TransactionState};
