//! # Summary
//!
//! This module abstracts over connections between replicas and clients.
//!
//! Uses `tokio-serde` with the bincode format on top of `tokio-util`'s
//! length-delimited codec, which in turn wraps a `tokio` TCP stream. Both
//! ends can then send and receive Rust structs with minimal boilerplate.

use tokio::net::TcpStream;
use tokio_serde::formats::Bincode;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Bidirectional channel reading `R` and writing `T`.
pub type Socket<R, T> = tokio_serde::Framed<
    Framed<TcpStream, LengthDelimitedCodec>,
    R,
    T,
    Bincode<R, T>,
>;

/// Wraps a connected stream so it reads `R` and writes `T`.
pub fn new<R, T>(stream: TcpStream) -> Socket<R, T>
where R: serde::de::DeserializeOwned,
      T: serde::Serialize,
{
    let frames = Framed::new(stream, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(frames, Bincode::default())
}
