mod account;
mod login;

pub mod prelude {
    pub use super::account::*;
    pub use super::login::*;
}
