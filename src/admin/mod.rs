//! User, role, dictionary and category administration

mod models;
pub mod remote;
mod repository;

pub use models::{
    DataCategory, DictData, DictType, Permission, RecordStatus, Role, User, UserForm,
};
pub use repository::{AdminError, InMemoryAdminRepository};
