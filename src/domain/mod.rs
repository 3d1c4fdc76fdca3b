//! Domain layer: the Link, Transaction and Request entities, the value
//! objects they are built from, and the ports the application layer drives.

pub mod identity;
pub mod link;
pub mod money;
pub mod ports;
pub mod request;
pub mod secret;
pub mod transaction;
