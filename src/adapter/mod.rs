pub mod dedup;
pub mod entity;
pub mod journal;
pub mod rocksdb;
