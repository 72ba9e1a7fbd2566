pub mod index;
pub mod inverted;
pub mod pipeline;
pub mod transactional;
