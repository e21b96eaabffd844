pub mod availability;
pub mod clock;
pub mod repository;
pub mod writer;

pub use availability::AvailabilityService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository, RepositoryError, SupabaseAppointmentRepository};
pub use writer::AppointmentWriter;
