pub mod compare;
mod console;
pub mod merge;
pub mod rank;
pub mod status;
