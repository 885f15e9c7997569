pub mod prelude;

pub mod daily_words;
pub mod room_guesses;
pub mod room_players;
pub mod rooms;
