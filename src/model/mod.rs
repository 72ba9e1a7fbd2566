pub mod catalogue;
pub mod enumeration;
pub mod factory;
pub mod hierarchy;
pub mod relations;
pub mod relationship;
pub mod resolver;
pub mod restricted;
pub mod types;
