pub mod aggregator;
pub mod breaker;
pub mod executor;
pub mod reconcile;
pub mod seatmap;
pub mod session;

pub use aggregator::FerryAggregator;
pub use breaker::CircuitBreaker;
pub use executor::BookingExecutor;
pub use reconcile::PaymentReconciler;
pub use session::SessionManager;
