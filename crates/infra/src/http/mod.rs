//! Blocking HTTP transport used by the SII integration

pub mod client;

pub use client::{
    BlockingHttpTransport, HttpReply, HttpTransport, MultipartRequest, SoapRequest,
    TransportFault, TransportOptions,
};
