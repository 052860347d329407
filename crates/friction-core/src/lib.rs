pub mod category;
pub mod profile;
pub mod signal;
pub mod window;

#[cfg(test)]
mod tests;

pub use category::*;
pub use profile::*;
pub use signal::*;
pub use window::*;
