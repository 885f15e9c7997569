pub use super::daily_words::Entity as DailyWords;
pub use super::room_guesses::Entity as RoomGuesses;
pub use super::room_players::Entity as RoomPlayers;
pub use super::rooms::Entity as Rooms;
