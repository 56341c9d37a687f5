//! Wire-level IMAP types.
//!
//! Requests and responses share one attribute tree so the compiler and the
//! parser agree on a single grammar.

mod attribute;
mod request;
mod response;
mod response_code;

pub use attribute::{Atom, Attribute, Partial, is_atom_char};
pub use request::Request;
pub use response::{Response, Status};
pub use response_code::ResponseCode;
