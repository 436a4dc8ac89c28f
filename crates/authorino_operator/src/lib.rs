pub mod api;
pub mod controllers;
pub mod reconcilers;
pub mod resources;
pub mod util;

#[cfg(test)]
pub mod fixtures;
#[cfg(test)]
pub mod tests;
