pub mod alert;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod time;
pub mod topic;
pub mod transport;
pub mod update;
pub mod util;

pub use alert::{Alert, AlertRequest};
pub use error::{RelayError, RelayResult};
pub use transport::{AlertBatch, AlertSender};
pub use update::AlertUpdate;
