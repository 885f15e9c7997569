pub mod daily_word_repository;
pub mod room_repository;

pub use daily_word_repository::*;
pub use room_repository::*;
