pub mod config;

pub use config::LikelihoodConfig;
