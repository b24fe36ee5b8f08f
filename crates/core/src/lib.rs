pub mod budget;
pub mod case;
pub mod controller;
pub mod examiner;
pub mod exhibit;
pub mod normalize;
pub mod objectives;
pub mod prompt;
pub mod protocol;
pub mod score;
pub mod session;
pub mod store;

pub use case::VivaCase;
pub use controller::TurnController;
pub use examiner::{Examiner, GeminiExaminer, OpenAiExaminer};
pub use protocol::{TurnRequest, TurnResponse};
pub use store::{InMemorySessionStore, SessionStore};
