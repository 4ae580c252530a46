pub mod builder;
pub mod front_end;
pub mod invoker;
pub mod runtime;
pub mod traits;
pub mod workspace;
