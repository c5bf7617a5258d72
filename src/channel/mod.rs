mod push;

pub use push::{PushSender, SenderReceiver};
