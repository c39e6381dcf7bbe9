pub mod backend;
pub mod records;
pub mod token;

pub use backend::{HttpBackend, Resource, ResourcePaths};
pub use token::JwtTokenDecoder;
