//! Delivery channels: how a rendered message reaches a contact.

pub mod direct_link;
pub mod port;
pub mod remote_server;
pub mod types;

pub use direct_link::DirectLinkChannel;
pub use port::{DeliveryChannel, LinkOpener, RemoteServerApi};
pub use remote_server::RemoteServerChannel;
pub use types::DeliveryFailure;
