pub mod invoke;
pub mod response;
pub mod stacks;
