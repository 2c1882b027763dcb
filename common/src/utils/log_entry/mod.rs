pub mod detection;
pub mod io;
pub mod system;
