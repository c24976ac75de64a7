//! Client for the CMS2000 solar inverter monitor.
//!
//! The device only sends telemetry after a short handshake: the client
//! resets the device's serial port, answers an identify frame with the
//! device serial, acknowledges twice and then receives a data frame.
//!
//! ```text
//!   client                          device
//!   RESET_A, RESET_B  ------------>
//!                     <------------ aa aa 00 00 01 00 00 80  identify
//!   identify reply    ------------>
//!                     <------------ aa aa 00 01 01 00 00 81  ack1
//!   ACK_1             ------------>
//!                     <------------ aa aa 00 01 01 00 01 80  ack2
//!   ACK_2             ------------>
//!                     <------------ aa aa 00 01 01 00 01 82  data
//! ```

pub mod error;
pub mod handshake;
pub mod inverter;
pub mod packet;
pub mod reading;

pub use error::Error;
pub use inverter::Cms2000;
pub use reading::Reading;
