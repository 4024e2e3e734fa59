pub mod files;
pub mod integrations;
pub mod media;
pub mod sports;
pub mod streams;
pub mod uploads;
pub mod webhooks;
