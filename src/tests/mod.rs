#[cfg(test)]
pub mod mock;

#[cfg(test)]
mod visitor_tests;
