pub mod client;
pub mod local;
pub mod transport;


pub use client::ExchangeClient;
pub use local::LocalExchangeTransport;
pub use transport::{ExchangeTransport, PagesResponse};
