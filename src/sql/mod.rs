//! SQL text handling: scanning, validation, count rewriting, rendering and
//! statement builders. Nothing in here touches a connection.

pub mod builder;
pub mod count;
pub mod render;
pub mod scan;
pub mod validator;

pub use builder::{Select, delete, insert, update};
pub use count::{CountQuery, CountStrategy, count_statement, strip_limit};
pub use render::interpolate;
pub use validator::{Verb, validate, validate_params};
