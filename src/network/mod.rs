//! Delivery to the APRS-IS relay network

pub mod channel;
pub mod gateway;
pub mod queue;
pub mod session;
pub mod stats;

pub use channel::{Backoff, ChannelConfig, ConnectionState, DeliveryChannel};
pub use gateway::{AddressFamily, Gateway, GatewayCycle};
pub use queue::{outbound_queue, FrameReceiver, FrameSender};
pub use session::{Dialer, Login, Session, TcpDialer, TcpSession};
pub use stats::{DeliveryStats, DeliveryStatsSnapshot};
