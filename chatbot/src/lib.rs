pub mod cli;
pub mod contact;
pub mod dialogue;
pub mod error;
pub mod scheduler;
pub mod services;
pub mod settings;
pub mod units;
pub mod whatsapp;
