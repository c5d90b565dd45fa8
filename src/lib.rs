#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod export;
pub mod html;
pub mod input;
pub mod layout;
pub mod logging;
pub mod media;
pub mod post;
pub mod render;
pub mod thumbnail;
pub mod variant;
