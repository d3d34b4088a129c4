pub mod comment;
pub mod follow;
pub mod like;
pub mod user;
pub mod video;
pub mod view;

pub use comment::Entity as Comment;
pub use follow::Entity as Follow;
pub use like::Entity as Like;
pub use user::Entity as User;
pub use video::Entity as Video;
pub use view::Entity as View;
