//! Channel creation flags

use bitflags::bitflags;

/// `connect_attach` index requesting a connection id outside the file
/// descriptor range
pub const SIDE_CHANNEL: i32 = 0x4000_0000;

bitflags! {
    /// Behaviour requested when a channel is created
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ChannelFlags: u32 {
        /// Do not float the receiving thread to the sender's priority
        const FIXED_PRIORITY = 0x01;
        /// Deliver an unblock pulse when a blocked sender is interrupted
        const UNBLOCK = 0x02;
        /// Deliver a pulse when a thread in the process dies
        const THREAD_DEATH = 0x04;
        /// Deliver a pulse when a client connection goes away
        const DISCONNECT = 0x08;
        /// Report the sender's full length instead of message data
        const SENDER_LEN = 0x20;
        /// Deliver a pulse when a connection this process holds dies
        const COID_DISCONNECT = 0x40;
        /// Report the reply length to the sender
        const REPLY_LEN = 0x80;
    }
}
