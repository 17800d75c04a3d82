pub mod browse;
pub mod events;
