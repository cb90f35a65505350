pub mod castles;
pub mod fetch;
pub mod geni;
pub mod tree;
