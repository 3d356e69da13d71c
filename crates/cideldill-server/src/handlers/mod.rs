pub mod breakpoints;
pub mod call;
pub mod cids;
pub mod debug_client;
pub mod health;
pub mod paused;
pub mod repl;
