pub mod comments;
pub mod encode_worker;
pub mod likes;
pub mod storage;
pub mod tags;
pub mod transcoder;
pub mod videos;

pub use comments::CommentService;
pub use encode_worker::{EncodeContext, EncodeQueue};
pub use likes::LikeService;
pub use storage::StorageClient;
pub use tags::TagService;
pub use transcoder::TranscodingEngine;
pub use videos::VideoService;
