//! Blocking TCP transport adapter: an 8-byte big-endian length
//! prefix followed by a `serde_json`-encoded envelope, one request-response
//! round per call. Replaces the sibling crate's `tokio`/`axum` HTTP stack,
//! which served an unrelated SaaS API and is dropped here (see DESIGN.md).

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{TransportError, UpsiError};

/// Ceiling on a single message's serialized size, matching "≥ 1 GiB
/// accepted" contract.
pub const DEFAULT_SIZE_LIMIT: u64 = 1 << 30;

/// A length-delimited duplex channel over a single `TcpStream`.
pub struct Channel {
    stream: TcpStream,
    size_limit: u64,
}

impl Channel {
    pub fn new(stream: TcpStream) -> Self {
        Channel {
            stream,
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    /// Connect as the client role to `addr`.
    pub fn connect(addr: &str) -> Result<Self, TransportError> {
        Ok(Channel::new(TcpStream::connect(addr)?))
    }

    /// Send one length-prefixed, JSON-encoded message.
    pub fn send<T: Serialize>(&mut self, msg: &T) -> Result<(), TransportError> {
        let body = serde_json::to_vec(msg).map_err(|e| {
            TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        if body.len() as u64 > self.size_limit {
            return Err(TransportError::TooLarge {
                size: body.len() as u64,
                limit: self.size_limit,
            });
        }
        self.stream.write_all(&(body.len() as u64).to_be_bytes())?;
        self.stream.write_all(&body)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Block for the next length-prefixed, JSON-encoded message.
    pub fn recv<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        let mut len_buf = [0u8; 8];
        self.stream.read_exact(&mut len_buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::PeerClosed
            } else {
                TransportError::Io(e)
            }
        })?;
        let len = u64::from_be_bytes(len_buf);
        if len > self.size_limit {
            return Err(TransportError::TooLarge {
                size: len,
                limit: self.size_limit,
            });
        }
        let mut body = vec![0u8; len as usize];
        self.stream.read_exact(&mut body)?;
        serde_json::from_slice(&body)
            .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// One blocking request/response round-trip (client role).
    pub fn request<Req: Serialize, Resp: DeserializeOwned>(
        &mut self,
        req: &Req,
    ) -> Result<Resp, TransportError> {
        self.send(req)?;
        self.recv()
    }
}

/// Server role: accept one connection and spawn a dispatcher thread that
/// runs `handler` for every request it reads, writing back each response.
/// Sessions are one-client-at-a-time per concurrency model, so a
/// single dispatcher thread per run suffices.
///
/// `handler` returns a `Result` rather than a bare `Resp`: a fatal protocol
/// error (out-of-order message, state mismatch, a crypto check failing)
/// ends the session the same way a transport error does, instead of
/// forcing every call site to `.expect()` and panic the dispatcher thread.
pub fn serve_one<Req, Resp, F>(
    listener: &TcpListener,
    mut handler: F,
) -> Result<std::thread::JoinHandle<Result<(), UpsiError>>, TransportError>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: FnMut(Req) -> Result<Resp, UpsiError> + Send + 'static,
{
    let (stream, _addr) = listener.accept()?;
    Ok(std::thread::spawn(move || {
        let mut channel = Channel::new(stream);
        loop {
            let req: Req = match channel.recv() {
                Ok(r) => r,
                Err(TransportError::PeerClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let resp = handler(req)?;
            channel.send(&resp)?;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Ping(u32);

    #[test]
    fn round_trips_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle =
            serve_one::<Ping, Ping, _>(&listener, |req: Ping| Ok(Ping(req.0 + 1))).unwrap();

        let mut client = Channel::connect(&addr.to_string()).unwrap();
        let resp: Ping = client.request(&Ping(41)).unwrap();
        assert_eq!(resp, Ping(42));

        drop(client);
        handle.join().unwrap().unwrap();
    }
}
