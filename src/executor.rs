mod dispatch;
mod strategy;

pub use dispatch::{CommandOutput, CompiledCommand, CompiledFunc, Dispatcher};
pub use strategy::{CommandDescriptor, Strategy, classify};
