pub mod finalizer;
pub mod intent;
