pub mod aliases;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod elo;
pub mod fixture_match;
pub mod http_client;
pub mod kickoff;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod probabilities;
pub mod providers;
pub mod registry;
pub mod retry;
