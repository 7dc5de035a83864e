pub mod applications;
pub mod deployments;
pub mod env;
pub mod routes;
pub mod stacks;
