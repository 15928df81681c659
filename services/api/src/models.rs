//! Gallery models for request and response payloads

pub mod collection;
pub mod photo;

pub use collection::{Collection, CollectionView, NewCollection, UpdateCollection};
pub use photo::{Comment, LikeState, NewComment, NewPhoto, Photo, PhotoView};
