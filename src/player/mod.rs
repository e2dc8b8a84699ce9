pub mod element;
pub mod geometry;
pub mod mpv;
pub mod session;
