//! Multiplexing-layer packet handling for wiremux.
//!
//! This is the pure, stateless heart of the protocol: a typed packet model,
//! a defensive text codec for the partially-numeric wire format, a recursive
//! argument value tree, and reassembly of binary attachment payloads.
//! No I/O and no clocks: everything here is driven by the session layers above.

pub mod binary;
pub mod codec;
pub mod error;
pub mod packet;
pub mod value;

pub use binary::{BinaryAssembler, BinaryMessage};
pub use codec::{decode, encode};
pub use error::{PacketError, Result};
pub use packet::{Packet, PacketKind, DEFAULT_CHANNEL};
pub use value::ArgValue;
