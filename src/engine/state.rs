use strum_macros::Display;

/// Upload engine lifecycle states (spec §4.6, §5).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub enum DeviceState {
    /// No connection attempted yet.
    Idle,
    /// Scanning for a matching peripheral.
    Scanning,
    /// Connecting to a matched peripheral.
    Connecting,
    /// Discovering services and characteristics.
    Discovering,
    /// Subscribed to notifications, waiting for the first device-status.
    AwaitingStatus,
    /// Settled and ready to announce an upload.
    Ready,
    /// Writing the info frame.
    AnnouncingInfo,
    /// Streaming data-chunk frames.
    Streaming {
        /// Total packet count for this transfer.
        total: usize,
        /// Packets written so far.
        sent: usize,
        /// Whether the device has reported an error during this transfer.
        errored: bool,
    },
    /// Waiting for the terminal notification after the last chunk.
    Finalizing,
    /// Disconnected; this handle must not be reused.
    Closed,
}
