//! Built-in regression suites.

pub mod parser;
pub mod profile;
pub mod protocol;
pub mod smoke;

pub use parser::ParserSuite;
pub use profile::ProfileSuite;
pub use protocol::ProtocolSuite;
pub use smoke::SmokeSuite;
