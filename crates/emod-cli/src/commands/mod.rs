pub mod completions;
pub mod flags;
pub mod inspect;
pub mod solve;
pub mod util;
