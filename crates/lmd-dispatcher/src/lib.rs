pub mod dispatcher;
pub mod retry;
pub mod sink;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use sink::{DeliveryOutcome, SubscriberSink, WebhookSink};
