pub mod build;
pub mod score;
pub mod status;
