pub mod page_factory;
pub mod task_context_factory;

pub use page_factory::PageFactory;
pub use task_context_factory::TaskContextFactory;
