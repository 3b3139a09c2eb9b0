//! Command-level tests

pub mod fakes;
mod test_init_session;
mod test_scrape;
