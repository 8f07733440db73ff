pub mod aws;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod parser;
pub mod processor;
pub mod remote;
pub mod storage;
