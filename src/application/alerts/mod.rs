pub mod dispatcher;
pub mod message;

pub use dispatcher::{AlertDispatcher, AlertOutcome};
pub use message::format_alert;
