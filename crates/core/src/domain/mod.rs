pub mod book;
pub mod conversation;
pub mod customer;
pub mod order;
