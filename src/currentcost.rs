//! Line framing for a CurrentCost energy monitor.
//!
//! The monitor prints one XML document per line on its serial port. Lines
//! are handed on untouched; nothing here looks inside the XML.

use crate::prelude::*;

use {
    futures::StreamExt,
    thiserror::Error,
    tokio::io::AsyncRead,
    tokio_serial::SerialPortBuilderExt,
    tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead},
};

/// Longest line the monitor is expected to send.
pub const MAX_LINE_LENGTH: usize = 16 * 1024;

// the monitor occasionally prefixes a line with this byte
const LINE_NOISE: u8 = 0xFC;

#[derive(Error, Debug)]
pub enum Error {
    #[error("line too long")]
    LineTooLong,

    #[error("line empty")]
    LineEmpty,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

// Message {{{
/// One raw line from the monitor, with any leading noise byte removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    raw: String,
}

impl Message {
    fn from_line(line: &[u8]) -> Result<Self, Error> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let line = line.strip_prefix(&[LINE_NOISE]).unwrap_or(line);

        if line.is_empty() {
            return Err(Error::LineEmpty);
        }

        Ok(Self {
            raw: String::from_utf8_lossy(line).into_owned(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
} // }}}

/// Reads `\n` terminated lines from the monitor.
///
/// An overlong line is skipped up to its newline and reported once.
pub struct MessageReader<R> {
    lines: FramedRead<R, AnyDelimiterCodec>,
    // FramedRead ends the stream once after a codec error, then carries on
    after_error: bool,
}

impl<R> MessageReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_max_length(reader, MAX_LINE_LENGTH)
    }

    pub fn with_max_length(reader: R, max_length: usize) -> Self {
        let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_length);

        Self {
            lines: FramedRead::new(reader, codec),
            after_error: false,
        }
    }

    /// Reads the next line.
    ///
    /// `LineTooLong` and `LineEmpty` are per-line errors and the reader
    /// can carry on afterwards. `Ok(None)` means the stream has ended.
    pub async fn read_message(&mut self) -> Result<Option<Message>, Error> {
        loop {
            match self.lines.next().await {
                None if self.after_error => self.after_error = false,
                None => return Ok(None),
                Some(Err(e)) => {
                    self.after_error = true;
                    return Err(match e {
                        AnyDelimiterCodecError::MaxChunkLengthExceeded => Error::LineTooLong,
                        AnyDelimiterCodecError::Io(e) => Error::Io(e),
                    });
                }
                Some(Ok(line)) => return Message::from_line(&line).map(Some),
            }
        }
    }
}

/// Opens the monitor's serial port (8N1).
pub fn open_serial(device: &str, baudrate: u32) -> Result<MessageReader<tokio_serial::SerialStream>, Error> {
    info!("opening currentcost serial port {} at {} baud", device, baudrate);

    let port = tokio_serial::new(device, baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .open_native_async()?;

    Ok(MessageReader::new(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all<R: AsyncRead + Unpin>(reader: &mut MessageReader<R>) -> Vec<Result<String, String>> {
        let mut r = Vec::new();
        loop {
            match reader.read_message().await {
                Ok(Some(msg)) => r.push(Ok(msg.raw().to_string())),
                Ok(None) => break,
                Err(e) => r.push(Err(e.to_string())),
            }
        }
        r
    }

    #[test]
    fn strips_noise_byte_and_cr() {
        let msg = Message::from_line(b"\xfc<msg></msg>\r").unwrap();
        assert_eq!(msg.raw(), "<msg></msg>");
    }

    #[test]
    fn noise_byte_alone_is_empty() {
        assert!(matches!(Message::from_line(b"\xfc"), Err(Error::LineEmpty)));
        assert!(matches!(Message::from_line(b"\r"), Err(Error::LineEmpty)));
        assert!(matches!(Message::from_line(b""), Err(Error::LineEmpty)));
    }

    #[tokio::test]
    async fn reader_recovers_after_bad_lines() {
        let input: &[u8] = b"<msg>a</msg>\r\n\n\xfc<msg>b</msg>\n";
        let mut reader = MessageReader::new(input);

        assert_eq!(reader.read_message().await.unwrap().unwrap().raw(), "<msg>a</msg>");
        assert!(matches!(reader.read_message().await, Err(Error::LineEmpty)));
        assert_eq!(reader.read_message().await.unwrap().unwrap().raw(), "<msg>b</msg>");
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn overlong_line_is_reported_once_and_skipped() {
        let input: &[u8] = b"0123456789abcdef\nshort\n";
        let mut reader = MessageReader::with_max_length(input, 8);

        assert_eq!(
            read_all(&mut reader).await,
            vec![Err("line too long".to_string()), Ok("short".to_string())]
        );
    }

    #[tokio::test]
    async fn unterminated_last_line_is_returned() {
        let input: &[u8] = b"<msg>1</msg>\n<msg>2</msg>";
        let mut reader = MessageReader::new(input);

        assert_eq!(
            read_all(&mut reader).await,
            vec![Ok("<msg>1</msg>".to_string()), Ok("<msg>2</msg>".to_string())]
        );
    }
}
