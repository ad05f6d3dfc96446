pub mod dcf;
pub mod input;
pub mod margin;
