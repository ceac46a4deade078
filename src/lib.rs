//! # Receipts Telegram Bot
//!
//! A Telegram bot that forwards photographed receipts to a vision-capable
//! language model, normalizes the extracted JSON and stores the result
//! in a Postgres database.

pub mod bot;
pub mod config;
pub mod db;
pub mod extraction;
pub mod vision;
pub mod workflow;
