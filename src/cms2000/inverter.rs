use crate::prelude::*;

use crate::cms2000::{
    handshake::{Handshake, Step},
    packet::MAX_FRAME_SIZE,
    reading::Reading,
    Error,
};

use {
    bytes::Bytes,
    net2::TcpStreamExt,
    std::time::Duration,
    tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    tokio::net::TcpStream,
    tokio::sync::mpsc,
};

const TCP_KEEPALIVE_SECS: u64 = 60;
// frames queued between the reader task and the handshake
const FRAME_QUEUE_DEPTH: usize = 32;

/// Frame reader -> handshake.
#[derive(Debug)]
pub enum ChannelData {
    Frame(Bytes),
    ReadError(std::io::Error),
}

#[derive(Debug)]
pub enum Connection {
    Closed,
    Open(TcpStream),
}

impl Connection {
    pub fn is_open(&self) -> bool {
        matches!(self, Connection::Open(_))
    }
}

/// Client for a CMS2000 inverter monitor.
///
/// A connection is opened for each reading and closed again once the data
/// frame arrives or the cycle fails.
pub struct Cms2000 {
    config: config::Cms2000,
    connection: Connection,
}

impl Cms2000 {
    pub fn new(config: config::Cms2000) -> Self {
        Self {
            config,
            connection: Connection::Closed,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Takes one reading from the configured host.
    pub async fn get_reading(&mut self) -> Result<Reading, Error> {
        let addr = self.config.address();
        self.get_reading_from(&addr).await
    }

    pub async fn get_reading_from(&mut self, addr: &str) -> Result<Reading, Error> {
        self.ensure_connected(addr).await?;

        let read_timeout = self.config.read_timeout();
        let max_unrecognised = self.config.max_unrecognised_frames();

        let result = match &mut self.connection {
            Connection::Open(stream) => {
                let (reader, mut writer) = stream.split();
                let cycle = Self::cycle(reader, &mut writer, max_unrecognised);

                match tokio::time::timeout(Duration::from_secs(read_timeout), cycle).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout(read_timeout)),
                }
            }
            Connection::Closed => Err(Error::Connect {
                addr: addr.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotConnected, "no connection"),
            }),
        };

        self.close();

        match &result {
            Ok(_) => debug!("cms2000 {}: reading complete, connection closed", addr),
            Err(e) => warn!("cms2000 {}: {}, connection closed", addr, e),
        }

        result
    }

    /// Drops the socket; the next reading reconnects and starts over.
    pub fn close(&mut self) {
        self.connection = Connection::Closed;
    }

    // Runs the frame reader alongside the handshake until the handshake
    // finishes. The reader may finish first after forwarding a read error,
    // which the handshake still has to pick up from the channel.
    async fn cycle<R, W>(reader: R, writer: &mut W, max_unrecognised: usize) -> Result<Reading, Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::channel(FRAME_QUEUE_DEPTH);

        let reader = Self::frame_reader(reader, tx);
        tokio::pin!(reader);
        let handshake = Self::handshake(writer, &mut rx, max_unrecognised);
        tokio::pin!(handshake);

        let mut reader_done = false;
        loop {
            tokio::select! {
                result = &mut handshake => return result,
                _ = &mut reader, if !reader_done => reader_done = true,
            }
        }
    }

    async fn ensure_connected(&mut self, addr: &str) -> Result<(), Error> {
        if self.connection.is_open() {
            return Ok(());
        }

        info!("connecting to cms2000 at {}", addr);

        let connect_error = |source| Error::Connect {
            addr: addr.to_string(),
            source,
        };

        let stream = match tokio::time::timeout(
            Duration::from_secs(self.config.read_timeout()),
            TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_error(e)),
            Err(_) => {
                return Err(connect_error(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connection timed out",
                )))
            }
        };

        let std_stream = stream.into_std().map_err(connect_error)?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("Failed to set TCP keepalive: {}", e);
        }
        let stream = TcpStream::from_std(std_stream).map_err(connect_error)?;

        if self.config.use_tcp_nodelay() {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        info!("cms2000 {}: connected!", addr);
        self.connection = Connection::Open(stream);

        Ok(())
    }

    // device -> handshake
    async fn frame_reader<R>(mut socket: R, tx: mpsc::Sender<ChannelData>)
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = [0u8; MAX_FRAME_SIZE];

        loop {
            let data = match socket.read(&mut buf).await {
                Ok(0) => ChannelData::ReadError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )),
                Ok(n) => ChannelData::Frame(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => ChannelData::ReadError(e),
            };

            let last = matches!(data, ChannelData::ReadError(_));
            // a closed channel means the handshake is finished with us
            if tx.send(data).await.is_err() || last {
                break;
            }
        }
    }

    async fn handshake<W>(
        writer: &mut W,
        rx: &mut mpsc::Receiver<ChannelData>,
        max_unrecognised: usize,
    ) -> Result<Reading, Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut handshake = Handshake::new(max_unrecognised);

        for command in handshake.start() {
            Self::send(writer, command).await?;
        }

        loop {
            let frame = match rx.recv().await {
                Some(ChannelData::Frame(frame)) => frame,
                Some(ChannelData::ReadError(e)) => return Err(Error::Read(e)),
                None => {
                    return Err(Error::Read(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "frame reader stopped",
                    )))
                }
            };

            debug!("cms2000: RX {:02x?}", frame.as_ref());

            for step in handshake.on_frame(&frame)? {
                match step {
                    Step::Send(command) => Self::send(writer, &command).await?,
                    Step::Ignore => debug!("cms2000: ignoring unrecognised frame"),
                    Step::Complete(reading) => return Ok(reading),
                }
            }
        }
    }

    async fn send<W>(writer: &mut W, bytes: &[u8]) -> Result<(), Error>
    where
        W: AsyncWrite + Unpin,
    {
        debug!("cms2000: TX {:02x?}", bytes);
        writer.write_all(bytes).await.map_err(Error::Write)?;
        writer.flush().await.map_err(Error::Write)
    }
}
