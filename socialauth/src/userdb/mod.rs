mod errors;
mod storage;
mod types;

pub use errors::UserError;
pub use types::User;
pub(crate) use types::UserSearchField;
pub(crate) use storage::UserStore;

pub(crate) async fn init() -> Result<(), UserError> {
    UserStore::init().await
}
