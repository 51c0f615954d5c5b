//! Common traits for event senders

/// Common event sender trait
///
/// Drivers report asynchronous events through this trait so they do not
/// depend on how the receiving service stores or queues them.
pub trait Sender<E> {
    /// Attempt to send an event
    ///
    /// Return none if the event cannot currently be sent
    fn try_send(&mut self, event: E) -> Option<()>;
    /// Send an event
    fn send(&mut self, event: E) -> impl Future<Output = ()>;
}
