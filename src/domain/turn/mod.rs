//! Turn module - immutable records of processed interactions.

#[allow(clippy::module_inception)]
mod turn;

pub use turn::{
    ClampNote, RecordedTurn, Stage, StageOutputs, Turn, TurnInput, TurnMode, TurnOutcome,
    MAX_INPUT_LENGTH,
};
