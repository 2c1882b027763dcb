pub mod default;
pub mod detection;
pub mod javascript;
pub mod log;
pub mod theme;
