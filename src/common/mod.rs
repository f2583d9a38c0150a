mod fs;
mod output;

pub(crate) use fs::*;
pub(crate) use output::*;
