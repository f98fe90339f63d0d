pub mod channel;
pub mod geometry;
pub mod persistence;
pub mod score;
pub mod settings;
