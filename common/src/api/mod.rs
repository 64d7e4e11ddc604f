pub mod mail;
pub mod pagination;
