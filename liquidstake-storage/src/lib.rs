pub mod db;
pub mod keys;


pub use db::Storage;
