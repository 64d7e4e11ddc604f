pub mod department;
pub mod file;
pub mod history;
pub mod issue;
pub mod letter;
pub mod performance;
pub mod role;
pub mod user;
