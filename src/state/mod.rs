pub mod container;
pub mod model;
pub mod persist;
pub mod view;
