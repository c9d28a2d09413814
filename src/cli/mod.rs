pub mod repl;

pub use repl::Repl;
