pub mod dump;
pub mod render;
pub mod warm;
