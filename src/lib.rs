pub mod anonymizer;
pub mod error;
pub mod input;
pub mod logging;
pub mod parser;
pub mod schema;
pub mod writer;

pub use error::{AnonymizeError, Result};
