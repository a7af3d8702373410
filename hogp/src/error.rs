//! Unified error type for the engine.
//!
//! All variants carry only fixed-size data; there is no `alloc`. The outward
//! intent API flattens these into `bool`, callers that need structure
//! subscribe to the diagnostic streams instead.

/// Top-level error type used across the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Caller misuse
    /// The engine handle was used before `initialize` or after `close`.
    NotInitialized,

    // Capability
    /// The platform cannot act as a GATT peripheral.
    PeripheralNotSupported,

    // Resource
    /// The GATT server has no room for another service.
    ServerFull,
    /// The BLE stack rejected the service registration.
    AddServiceFailed,

    // Activation
    /// The requested profile is already active. Benign.
    AlreadyActive,

    // State
    /// The HID host suspended the service via the Control Point.
    Suspended,
    /// The central never enabled notifications on the target characteristic.
    NotificationsNotEnabled,
    /// No central is connected.
    NotConnected,
    /// No active profile carries the requested report kind.
    ProfileNotActive,

    // Backpressure
    /// The notification queue is full and no lower-priority victim exists.
    QueueFull,

    // Encoding
    /// More than six concurrent non-modifier keys were requested.
    TooManyKeys,

    // Protocol
    /// A GATT read started past the end of the attribute value.
    AttributeInvalidOffset,
    /// A GATT write addressed a characteristic that does not accept writes.
    AttributeWriteNotPermitted,

    // Runtime
    /// The link dropped underneath an operation.
    LinkLost,
    /// The `Connecting` state outlived the configured timeout.
    Timeout,
}
