//! Database query modules for the rating service

pub mod choices;
pub mod competitions;
pub mod sessions;
