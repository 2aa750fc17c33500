pub mod connection;
pub mod migrate;
pub mod seed;
