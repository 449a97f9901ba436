pub mod api;
pub mod client;
pub mod controllers;
pub mod framework;
pub mod util;

#[cfg(test)]
pub mod tests;
