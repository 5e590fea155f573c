//! Controller between a self-adaptive system simulator and its learners.
//!
//! The simulator posts one request per adaptation cycle. Depending on the
//! query, the controller trains or queries one of four learners, or appends the
//! cycle's measured outcome to a comparison log.

pub mod config;
pub mod error;
pub mod learners;
pub mod router;
pub mod server;
pub mod storage;

pub use config::ControllerConfig;
pub use error::ControllerError;
pub use server::serve;
