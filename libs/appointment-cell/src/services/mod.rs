pub mod booking;
pub mod lifecycle;
pub mod review;
pub mod video;

pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use review::ReviewService;
pub use video::VideoSessionService;
