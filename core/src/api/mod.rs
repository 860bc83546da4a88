//! Control surfaces over a running overlay

pub mod messaging;
