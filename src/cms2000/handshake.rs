use crate::prelude::*;

use crate::cms2000::{
    packet::{self, Response},
    reading::Reading,
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    AwaitingIdentify,
    AwaitingAck1,
    AwaitingAck2,
    AwaitingData,
    Done,
}

/// What the driver should do after feeding a frame to the [`Handshake`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Send(Vec<u8>),
    Ignore,
    Complete(Reading),
}

/// The client side of the CMS2000 handshake, free of any I/O.
///
/// Every recognised response is answered even when it arrives out of
/// sequence (the device is known to repeat its identify frame); the state
/// then jumps to whatever follows that response.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
    unrecognised: usize,
    max_unrecognised: usize,
}

impl Handshake {
    pub fn new(max_unrecognised: usize) -> Self {
        Self {
            state: HandshakeState::Idle,
            unrecognised: 0,
            max_unrecognised,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The two serial-port resets written straight after connecting.
    pub fn start(&mut self) -> [&'static [u8]; 2] {
        self.state = HandshakeState::AwaitingIdentify;
        self.unrecognised = 0;
        [&packet::RESET_A, &packet::RESET_B]
    }

    /// Answers every response found in `frame`, in handshake order.
    ///
    /// A data response ends the handshake; anything after it in the same
    /// frame is dropped. A frame with nothing usable in it yields a single
    /// [`Step::Ignore`].
    pub fn on_frame(&mut self, frame: &[u8]) -> Result<Vec<Step>, Error> {
        let mut steps = Vec::new();

        for response in Response::scan(frame) {
            if Some(response.name()) != self.expected() {
                debug!(
                    "cms2000: got {} response while {:?}, answering anyway",
                    response.name(),
                    self.state
                );
            }

            match response {
                Response::Identify(msg) => match packet::identify_reply(msg) {
                    Some(reply) => steps.push(self.advance(HandshakeState::AwaitingAck1, reply)),
                    None => warn!("cms2000: identify response too short ({} bytes), ignoring", msg.len()),
                },
                Response::Ack1(_) => {
                    steps.push(self.advance(HandshakeState::AwaitingAck2, packet::ACK_1.to_vec()))
                }
                Response::Ack2(_) => {
                    steps.push(self.advance(HandshakeState::AwaitingData, packet::ACK_2.to_vec()))
                }
                Response::Data(msg) => {
                    if !packet::verify_trailer(msg) {
                        // trailer covers the whole read, which may hold more than one message
                        debug!("cms2000: data frame trailer does not match checksum, not verified");
                    }

                    let reading = packet::decode(packet::data_payload(msg)?)?;

                    self.state = HandshakeState::Done;
                    self.unrecognised = 0;
                    steps.push(Step::Complete(reading));
                    return Ok(steps);
                }
            }
        }

        if steps.is_empty() {
            steps.push(self.ignore()?);
        }
        Ok(steps)
    }

    fn expected(&self) -> Option<&'static str> {
        match self.state {
            HandshakeState::AwaitingIdentify => Some("identify"),
            HandshakeState::AwaitingAck1 => Some("ack1"),
            HandshakeState::AwaitingAck2 => Some("ack2"),
            HandshakeState::AwaitingData => Some("data"),
            HandshakeState::Idle | HandshakeState::Done => None,
        }
    }

    fn advance(&mut self, next: HandshakeState, command: Vec<u8>) -> Step {
        self.state = next;
        self.unrecognised = 0;
        Step::Send(command)
    }

    fn ignore(&mut self) -> Result<Step, Error> {
        self.unrecognised += 1;
        if self.unrecognised > self.max_unrecognised {
            return Err(Error::TooManyUnrecognised(self.unrecognised));
        }
        Ok(Step::Ignore)
    }
}
