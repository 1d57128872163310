mod post;
mod user;

pub use post::{NewPost, Post, PostId, PostInput};
pub use user::{
    ChangePasswordRequest, DeleteAccountRequest, LoginRequest, LoginResponse, NewUser,
    NewUserRecord, UpdateUser, User, UserId,
};
