// External I/O operations module
pub mod dbus; // Desktop notifications over the session bus
pub mod lock; // Schedule and daemon lock files
pub mod signals; // Unix signal handling
