//! Line-delimited JSON transport
//!
//! One JSON value per `\n`-terminated line over any async byte stream. Both the
//! stdio server and the subprocess client sit on top of this module.

pub mod framing;
pub mod message;

pub use framing::{encode_line, FramedReader, FramedWriter, LineFramer, TransportError};
pub use message::{Message, RpcErrorObject, JSONRPC_VERSION};
