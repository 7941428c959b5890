pub mod entities;
pub mod error;
pub mod key;
pub mod model;
pub mod normalize;
pub mod response;
pub mod similarity;
pub mod traits;
