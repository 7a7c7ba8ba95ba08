// Task lifecycle states reported by the optimization engine.

pub mod states;

pub use states::TaskState;
