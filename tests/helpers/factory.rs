pub use super::factories::{PageFactory, TaskContextFactory};

pub struct Factory;

impl Factory {
    pub fn page() -> PageFactory {
        PageFactory::new()
    }

    pub fn task() -> TaskContextFactory {
        TaskContextFactory::new()
    }
}
