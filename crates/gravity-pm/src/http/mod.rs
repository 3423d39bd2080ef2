mod client;
pub mod transport;

pub use client::{HttpClient, HttpClientConfig, HttpError};
pub use transport::{ReqwestTransport, Transport, TransportTable};
