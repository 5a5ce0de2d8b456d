pub mod comment_repo;
pub mod like_repo;
pub mod video_repo;
