pub mod register;

pub use register::RegistrationService;
