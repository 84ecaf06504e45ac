pub mod game;
pub mod outcome;
pub mod status;

pub use game::GameRecord;
pub use outcome::Outcome;
pub use status::GameStatus;
