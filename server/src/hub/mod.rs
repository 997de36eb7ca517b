pub mod events;
pub mod member;
pub mod presence_hub;
pub mod room;
