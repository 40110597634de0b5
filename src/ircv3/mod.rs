//! IRCv3 helpers: batch reassembly and `server-time`.

pub mod batch;
pub mod server_time;

pub use self::batch::{generate_batch_ref, BatchReassembler, BatchStep};
pub use self::server_time::{format_server_time, parse_server_time};
