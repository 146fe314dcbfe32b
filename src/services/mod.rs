pub mod notifications;
pub mod read_state;
pub mod resolution;
pub mod split;
pub mod stats;
pub mod transition;
