pub mod cooccurrence;
pub mod language;
pub mod names;
pub mod parser;
pub mod pipeline;
pub mod popularity;
pub mod tfidf;
