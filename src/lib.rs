pub mod chain;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod dispatcher;
pub mod notification;
pub mod push;
pub mod registry;
