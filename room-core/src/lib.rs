pub mod change_feed;
pub mod collaborators;
pub mod daily_words;
pub mod guess_validation;
pub mod guest_identity;
pub mod inactivity;
pub mod policy;
pub mod presence;
pub mod reconcile;
pub mod room_code;
pub mod scoring;
pub mod session_controller;

// Re-export main components
pub use change_feed::*;
pub use collaborators::*;
pub use daily_words::*;
pub use guess_validation::*;
pub use guest_identity::*;
pub use inactivity::*;
pub use policy::*;
pub use presence::*;
pub use reconcile::*;
pub use room_code::*;
pub use scoring::*;
pub use session_controller::*;
