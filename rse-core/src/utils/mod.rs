pub mod identity;
pub mod jsonp;
