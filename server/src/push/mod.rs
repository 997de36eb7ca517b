pub mod crypto;
pub mod dispatcher;
pub mod vapid;
