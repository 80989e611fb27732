//! Trinket pair "top gear" comparison: profile parsing, simulation jobs, and the
//! result resolution & ranking engine that turns profileset results into a
//! leaderboard relative to the equipped pair.

pub mod cli;
pub mod config;
pub mod data;
pub mod jobs;
pub mod logging;
pub mod parallel;
pub mod server;
pub mod topgear;
