//! Domain entities - moments and the reactions attached to them

mod moment;
mod reaction;

pub use moment::Moment;
pub use reaction::{Reaction, ReactionCount};
