use thiserror::Error;

/// Ways a single reading cycle can fail.
///
/// Every variant leaves the client disconnected; the next call to
/// `Cms2000::get_reading` starts a fresh handshake.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read error: {0}")]
    Read(#[source] std::io::Error),

    #[error("write error: {0}")]
    Write(#[source] std::io::Error),

    #[error("no data frame received within {0} seconds")]
    Timeout(u64),

    #[error("gave up after {0} consecutive unrecognised frames")]
    TooManyUnrecognised(usize),

    #[error("malformed payload: {len} bytes, need at least {expected}")]
    MalformedPayload { len: usize, expected: usize },
}
