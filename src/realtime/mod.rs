pub mod messages;
pub mod publisher;

pub use messages::{channel_name, CandleUpsert, RealtimeMessage};
pub use publisher::{Delivery, RealtimePublisher};
