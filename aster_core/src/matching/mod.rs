mod bindings;
mod forms;
mod matcher;

pub use bindings::{Bindings, MatchResult};
pub use forms::{
    is_sequence, try_alternatives, try_blank, try_blank_null_sequence, try_blank_sequence,
    try_pattern, try_repeated, try_sequence,
};
pub use matcher::{MATCH_MAX, match_arity, match_pattern};
