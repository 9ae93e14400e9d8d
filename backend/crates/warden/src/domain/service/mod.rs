//! Domain services

pub mod path_matcher;

pub use path_matcher::PathMatcher;
