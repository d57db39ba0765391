//! Built-in environments for the curiosity crate.
//!
//! - `CartPole` - classic control with vector observations
//! - `PixelGrid` - grid navigation rendered as `[1, H, W]` frames

mod cartpole;
mod pixel_grid;

pub use cartpole::CartPole;
pub use pixel_grid::PixelGrid;

use curiosity::env::Env;

/// Names accepted by `make`
pub const ENV_NAMES: [&str; 2] = ["cartpole", "pixel-grid"];

/// Build a built-in environment by name
pub fn make(name: &str) -> Option<Box<dyn Env>> {
    match name {
        "cartpole" => Some(Box::new(CartPole::new())),
        "pixel-grid" => Some(Box::new(PixelGrid::default())),
        _ => None,
    }
}
