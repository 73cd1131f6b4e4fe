pub mod book;
pub mod cli_args;
pub mod config;
pub mod error;
mod extractor;
mod middleware;
mod route;
pub mod server;
pub mod state;
pub mod store;

pub use middleware::cors::CorsHeaders;

#[cfg(test)]
mod test;
