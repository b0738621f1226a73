#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;

pub mod attachments;
pub mod browser_controller;
pub mod client;
pub mod config;
pub mod harvester;
pub mod page;
pub mod search;
pub mod types;
pub mod utils;
pub mod wordlist;
