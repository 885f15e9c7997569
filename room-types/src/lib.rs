pub mod errors;
pub mod messages;
pub mod room;
pub mod session;

// Re-export all types
pub use errors::*;
pub use messages::*;
pub use room::*;
pub use session::*;
