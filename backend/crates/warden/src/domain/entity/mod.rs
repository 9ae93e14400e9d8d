//! Domain entities and value types

pub mod authority;
pub mod catalog;
pub mod page;
pub mod session;
pub mod subject;

pub use authority::Authority;
pub use catalog::Catalog;
pub use page::Page;
pub use session::Session;
pub use subject::SubjectDetails;
