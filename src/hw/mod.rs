pub mod btleplug_backend;
pub mod fake_backend;

pub use self::btleplug_backend::BtleplugBackend;
pub use self::fake_backend::FakeBackend;
