pub mod catch;
pub mod pipe;
pub mod tee;
